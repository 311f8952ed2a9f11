// Report generation over a crawled profile set

use crate::profile::ProfileSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub endpoint: String,
    pub total_profiles: usize,
    pub total_objects: usize,
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub name: String,
    pub object_count: usize,
    pub links: Vec<LinkSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub property: String,
    pub target: String,
}

/// Collect per-profile counts and link wiring, ordered by ascending object
/// count then name.
pub fn gather_report_data(set: &ProfileSet, endpoint: &str) -> ReportData {
    let mut profiles: Vec<ProfileSummary> = set
        .profiles
        .values()
        .map(|profile| ProfileSummary {
            name: profile.name.clone(),
            object_count: profile.objects.len(),
            links: profile
                .links
                .iter()
                .map(|(property, target)| LinkSummary {
                    property: property.clone(),
                    target: target.clone(),
                })
                .collect(),
        })
        .collect();
    profiles.sort_by(|a, b| {
        a.object_count
            .cmp(&b.object_count)
            .then_with(|| a.name.cmp(&b.name))
    });

    ReportData {
        endpoint: endpoint.to_string(),
        total_profiles: profiles.len(),
        total_objects: profiles.iter().map(|p| p.object_count).sum(),
        profiles,
    }
}

pub fn generate_text_report(data: &ReportData, hide_empty: bool) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Mini DB for {}\n", data.endpoint));
    report.push_str(&format!(
        "  {} profiles, {} objects\n\n",
        data.total_profiles, data.total_objects
    ));

    for profile in &data.profiles {
        if hide_empty && profile.object_count == 0 {
            continue;
        }
        report.push_str(&format!("{} {}\n", profile.name, profile.object_count));
        for link in &profile.links {
            report.push_str(&format!("\t{} {}\n", link.property, link.target));
        }
    }

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "minidb",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "endpoint": data.endpoint,
            "summary": {
                "total_profiles": data.total_profiles,
                "total_objects": data.total_objects
            },
            "profiles": data.profiles
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

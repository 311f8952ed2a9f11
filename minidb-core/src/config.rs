use crate::error::{MiniDbError, Result};
use crate::sampling::SamplingPolicy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Subsampling strategy document: profile name -> strategy entry.
pub type Strategy = BTreeMap<String, StrategyEntry>;

/// Top-level run configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Portal base URL, e.g. `https://api.data-portal.org`.
    pub endpoint: String,
    /// Query path returning the full schema document, e.g. `profiles`.
    pub profiles_query: String,
    /// Per-profile subsampling strategy.
    #[serde(default)]
    pub subsampling: Strategy,
}

/// One profile's entry in the strategy document.
///
/// Rate-based profiles carry `search_parameters`/`subsampling_rate`/
/// `subsampling_min`; pinned profiles carry `required`. An entry may carry
/// both.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StrategyEntry {
    #[serde(default)]
    pub required: Option<RequiredIds>,
    #[serde(default)]
    pub search_parameters: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub subsampling_rate: Option<f64>,
    #[serde(default)]
    pub subsampling_min: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RequiredIds {
    #[serde(default)]
    pub accession: Vec<String>,
    #[serde(default)]
    pub uuid: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MiniDbError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            MiniDbError::Config(format!("malformed configuration {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(MiniDbError::Config("endpoint is not set".to_string()));
        }
        if self.profiles_query.trim().is_empty() {
            return Err(MiniDbError::Config("profiles_query is not set".to_string()));
        }
        for (name, entry) in &self.subsampling {
            entry.validate(name)?;
        }
        Ok(())
    }
}

impl StrategyEntry {
    fn validate(&self, profile_name: &str) -> Result<()> {
        if let Some(rate) = self.subsampling_rate
            && !(0.0..=1.0).contains(&rate)
        {
            return Err(MiniDbError::Config(format!(
                "subsampling_rate for '{}' must be within [0, 1], got {}",
                profile_name, rate
            )));
        }
        Ok(())
    }

    /// Sampling policies declared by this entry, in declaration order.
    pub fn policies(&self) -> Vec<SamplingPolicy> {
        if self.subsampling_rate.is_none() && self.search_parameters.is_none() {
            return Vec::new();
        }
        vec![SamplingPolicy {
            search_parameters: self.search_parameters.clone().unwrap_or_default(),
            rate: self.subsampling_rate.unwrap_or(0.0),
            minimum: self.subsampling_min.unwrap_or(0),
        }]
    }

    /// Explicitly pinned identities, accessions first.
    pub fn required_ids(&self) -> Vec<String> {
        let Some(required) = &self.required else {
            return Vec::new();
        };
        let mut ids = required.accession.clone();
        ids.extend(required.uuid.iter().cloned());
        ids
    }
}

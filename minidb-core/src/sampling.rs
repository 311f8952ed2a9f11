use crate::error::Result;
use minidb_client::PortalClient;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::form_urlencoded;

/// Fixed seed shared process-wide. Every draw reseeds from this constant, so
/// a given match set and policy always yield the same sample sequence.
pub const SAMPLING_SEED: u64 = 0x5eed;

/// Declares how to seed one profile from a repository search.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPolicy {
    /// Extra query parameters merged into the search request.
    pub search_parameters: BTreeMap<String, String>,
    /// Fraction of the match set to draw, in [0, 1].
    pub rate: f64,
    /// Floor on the number of drawn identities.
    pub minimum: u64,
}

/// Sample count for a match set: `max(floor(rate * matches), minimum)`,
/// capped at the match count, zero when nothing matches.
pub fn sample_size(rate: f64, minimum: u64, matches: usize) -> usize {
    if matches == 0 {
        return 0;
    }
    let scaled = (rate * matches as f64).floor() as usize;
    scaled.max(minimum as usize).min(matches)
}

/// Draw a deterministic random subset of the identities matching `policy`.
///
/// The search selects the policy's parameters plus the profile's type, the
/// full unpaginated result set, and only the identity field. A 404 from the
/// search means zero matches, not an error. Draws are with replacement from a
/// freshly seeded generator; duplicate identities collapse on insertion.
pub async fn sample(
    client: &PortalClient,
    profile_name: &str,
    policy: &SamplingPolicy,
) -> Result<Vec<String>> {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("type", profile_name)
        .append_pair("limit", "all")
        .append_pair("field", "uuid");
    for (key, value) in &policy.search_parameters {
        query.append_pair(key, value);
    }
    let path = format!("search/?{}", query.finish());

    let doc = match client.get(&path).await {
        Ok(doc) => doc,
        Err(e) if e.status() == Some(404) => {
            debug!("Search for {} matched nothing", profile_name);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let matches = collect_identities(&doc);
    let count = sample_size(policy.rate, policy.minimum, matches.len());
    info!(
        "Sampling {}: {} matches, drawing {}",
        profile_name,
        matches.len(),
        count
    );
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(SAMPLING_SEED);
    Ok((0..count)
        .map(|_| matches[rng.random_range(0..matches.len())].clone())
        .collect())
}

fn collect_identities(doc: &Value) -> Vec<String> {
    doc.get("@graph")
        .and_then(Value::as_array)
        .map(|graph| {
            graph
                .iter()
                .filter_map(|obj| obj.get("uuid").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

use crate::error::{MiniDbError, Result};
use crate::profile::ProfileSet;
use crate::sampling::{SamplingPolicy, sample};
use minidb_client::PortalClient;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Called once per newly recorded object with (profile name, uuid).
pub type ProgressCallback = Arc<dyn Fn(String, String) + Send + Sync>;

/// One in-flight branch of the expansion.
///
/// `frontier` is the chain of ancestor identities on the path from the
/// traversal root; it exists only to detect cycles and is dropped when the
/// branch completes.
struct WorkItem {
    profile: String,
    reference: String,
    frontier: Vec<String>,
    depth: usize,
}

/// Depth-first closure crawler over a resolved [`ProfileSet`].
///
/// Nodes of the implicit graph are (profile, identity) pairs, edges are
/// link-property dereferences. The traversal is an explicit worklist rather
/// than call-stack recursion, so arbitrarily deep chains cannot overflow the
/// stack.
pub struct Crawler<'a> {
    client: &'a PortalClient,
    max_depth: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Crawler<'a> {
    pub fn new(client: &'a PortalClient) -> Self {
        Self {
            client,
            max_depth: DEFAULT_MAX_DEPTH,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl every top-level seed: required identities first, then the
    /// stratified sample for each profile with a sampling policy. Profiles
    /// are visited in name order for reproducible fetch sequencing.
    pub async fn crawl(&self, set: &mut ProfileSet) -> Result<()> {
        let required: Vec<(String, String)> = set
            .profiles
            .iter()
            .flat_map(|(name, profile)| {
                profile
                    .required
                    .iter()
                    .map(move |id| (name.clone(), format!("{}/{}", name, id)))
            })
            .collect();
        for (profile, reference) in required {
            self.expand(set, &profile, &reference).await?;
        }

        let sampled: Vec<(String, Vec<SamplingPolicy>)> = set
            .profiles
            .iter()
            .filter(|(_, profile)| !profile.sampling_policies.is_empty())
            .map(|(name, profile)| (name.clone(), profile.sampling_policies.clone()))
            .collect();
        for (name, policies) in sampled {
            for policy in policies {
                for id in sample(self.client, &name, &policy).await? {
                    let reference = format!("{}/{}", name, id);
                    self.expand(set, &name, &reference).await?;
                }
            }
        }

        info!("Crawl complete. {} objects retained", set.total_objects());
        Ok(())
    }

    /// Expand one seed: fetch the referenced object, record it against its
    /// profile, and walk every object reachable through link properties,
    /// stopping at cycles and at the depth limit.
    pub async fn expand(
        &self,
        set: &mut ProfileSet,
        profile_name: &str,
        reference: &str,
    ) -> Result<()> {
        let mut stack = vec![WorkItem {
            profile: profile_name.to_string(),
            reference: reference.to_string(),
            frontier: Vec::new(),
            depth: 0,
        }];

        while let Some(item) = stack.pop() {
            let ident = extract_identity(&item.reference);

            let profile = set
                .profiles
                .get(&item.profile)
                .ok_or_else(|| MiniDbError::UnknownProfile(item.profile.clone()))?;

            if profile.objects.contains_key(ident) {
                debug!("{}/{} already recorded", item.profile, ident);
                continue;
            }
            if item.frontier.iter().any(|ancestor| ancestor == ident) {
                info!(
                    "Cycle detected at {}/{}, halting this branch",
                    item.profile, ident
                );
                continue;
            }

            // Object fetches are fatal on failure: a dangling reference means
            // the upstream repository is inconsistent.
            let object = self.client.get(&item.reference).await?;

            // References may alias an identity by accession; the recorded key
            // is always the fetched object's uuid when it carries one.
            let key = object
                .get("uuid")
                .and_then(Value::as_str)
                .unwrap_or(ident)
                .to_string();
            if profile.objects.contains_key(&key) {
                debug!("{}/{} already recorded", item.profile, key);
                continue;
            }

            // The object itself is always recorded; descent stops once the
            // item's depth exceeds the limit, so the deepest retained objects
            // sit one level past it.
            let mut children = Vec::new();
            if item.depth > self.max_depth {
                warn!(
                    "Max depth {} reached at {}/{}, not expanding links",
                    self.max_depth, item.profile, key
                );
            } else {
                for (prop_name, target) in &profile.links {
                    match object.get(prop_name) {
                        Some(Value::String(child)) => {
                            children.push((target.clone(), child.clone()));
                        }
                        Some(Value::Array(refs)) => {
                            for child in refs {
                                if let Some(child) = child.as_str() {
                                    children.push((target.clone(), child.to_string()));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            let profile = set
                .profiles
                .get_mut(&item.profile)
                .expect("profile existence checked above");
            profile.insert_object(&key, object);
            if let Some(callback) = &self.progress_callback {
                callback(item.profile.clone(), key.clone());
            }

            // Reversed push keeps LIFO traversal in natural link order. The
            // frontier carries both spellings of this node when they differ,
            // so a back-reference by either the reference segment or the
            // uuid trips the cycle check.
            for (target, child_reference) in children.into_iter().rev() {
                let mut frontier = item.frontier.clone();
                frontier.push(key.clone());
                if ident != key {
                    frontier.push(ident.to_string());
                }
                stack.push(WorkItem {
                    profile: target,
                    reference: child_reference,
                    frontier,
                    depth: item.depth + 1,
                });
            }
        }

        Ok(())
    }
}

/// Identity carried by a reference: the last path segment of either a bare
/// uuid ("d1") or an object path ("/donors/d1/").
fn extract_identity(reference: &str) -> &str {
    reference
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference)
}

use crate::config::{Strategy, StrategyEntry};
use crate::error::{MiniDbError, Result};
use crate::sampling::SamplingPolicy;
use minidb_client::PortalClient;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One object type in the portal, named in CamelCase (e.g. `MouseDonor`).
pub struct Profile {
    pub name: String,
    /// JSON Schema document for this type; read-only after construction.
    pub schema: Value,
    /// Link property name -> target profile name. Populated during resolution.
    pub links: BTreeMap<String, String>,
    /// Object uuid -> fetched metadata object. Append-only, deduplicated.
    pub objects: BTreeMap<String, Value>,
    pub sampling_policies: Vec<SamplingPolicy>,
    /// Identities pinned by the strategy document, crawled unconditionally.
    pub required: Vec<String>,
}

impl Profile {
    pub fn new(name: &str, schema: Value) -> Self {
        Self {
            name: name.to_string(),
            schema,
            links: BTreeMap::new(),
            objects: BTreeMap::new(),
            sampling_policies: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, entry: &StrategyEntry) -> Self {
        self.sampling_policies = entry.policies();
        self.required = entry.required_ids();
        self
    }

    /// Idempotent insert. Returns true if the object was newly inserted.
    pub fn insert_object(&mut self, uuid: &str, object: Value) -> bool {
        if self.objects.contains_key(uuid) {
            return false;
        }
        self.objects.insert(uuid.to_string(), object);
        true
    }

    /// Discover this profile's declared links via schema inspection.
    pub fn find_links(&self) -> Result<Vec<(String, String)>> {
        find_links(&self.name, &self.schema)
    }
}

/// Pure link discovery over one schema document.
///
/// A property is a link when its type is `"string"` and it carries a `linkTo`
/// annotation, or when it is an `"array"` of strings whose item schema carries
/// one. A `linkTo` list emits one tuple per declared candidate.
pub fn find_links(profile_name: &str, schema: &Value) -> Result<Vec<(String, String)>> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut links = Vec::new();
    for (prop_name, prop) in properties {
        let link_to = match prop.get("type").and_then(Value::as_str) {
            Some("string") => prop.get("linkTo"),
            Some("array") => prop
                .get("items")
                .filter(|items| items.get("type").and_then(Value::as_str) == Some("string"))
                .and_then(|items| items.get("linkTo")),
            _ => None,
        };

        match link_to {
            None => {}
            Some(Value::String(target)) => {
                debug!("Found link {}.{} -> {}", profile_name, prop_name, target);
                links.push((prop_name.clone(), target.clone()));
            }
            Some(Value::Array(targets)) => {
                for target in targets {
                    let Some(target) = target.as_str() else {
                        return Err(MiniDbError::Config(format!(
                            "linkTo list for {}.{} must contain strings",
                            profile_name, prop_name
                        )));
                    };
                    debug!("Found link {}.{} -> {}", profile_name, prop_name, target);
                    links.push((prop_name.clone(), target.to_string()));
                }
            }
            Some(_) => {
                return Err(MiniDbError::Config(format!(
                    "linkTo for {}.{} must be a string or a list of strings",
                    profile_name, prop_name
                )));
            }
        }
    }
    Ok(links)
}

/// The full, possibly cyclic, directed graph of profiles.
pub struct ProfileSet {
    pub profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    /// Build the initial set from a schema document keyed by profile name.
    /// Keys starting with `_` or `@` are document metadata, not profiles.
    pub fn from_schema_document(doc: &Value, strategy: &Strategy) -> Result<Self> {
        let entries = doc.as_object().ok_or_else(|| {
            MiniDbError::Config("schema document must be a JSON object".to_string())
        })?;

        let mut profiles = BTreeMap::new();
        for (name, schema) in entries {
            if name.starts_with('_') || name.starts_with('@') {
                continue;
            }
            let mut profile = Profile::new(name, schema.clone());
            if let Some(entry) = strategy.get(name) {
                profile = profile.with_strategy(entry);
            }
            profiles.insert(name.clone(), profile);
        }

        Ok(Self { profiles })
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn total_objects(&self) -> usize {
        self.profiles.values().map(|p| p.objects.len()).sum()
    }

    /// Make the set link-complete.
    ///
    /// Profiles referenced by links but absent from the initial schema
    /// snapshot are fetched on demand (`profiles/{name}`), repeating until no
    /// new targets appear, then every discovered link is bound to its target
    /// profile name. Idempotent when no new links exist. A schema that cannot
    /// be fetched is fatal: the graph cannot be made link-complete.
    pub async fn resolve(&mut self, client: &PortalClient, strategy: &Strategy) -> Result<()> {
        loop {
            let mut missing = BTreeSet::new();
            for profile in self.profiles.values() {
                for (_, target) in profile.find_links()? {
                    if !self.profiles.contains_key(&target) {
                        missing.insert(target);
                    }
                }
            }

            if missing.is_empty() {
                break;
            }

            for name in missing {
                let schema = client.get(&format!("profiles/{}", name)).await.map_err(
                    |source| MiniDbError::LinkResolution {
                        profile: name.clone(),
                        source,
                    },
                )?;
                info!("Fetched missing profile schema on demand: {}", name);

                let mut profile = Profile::new(&name, schema);
                if let Some(entry) = strategy.get(&name) {
                    profile = profile.with_strategy(entry);
                }
                self.profiles.insert(name, profile);
            }
        }

        // Every strategy entry must now name a known profile; anything else
        // is a typo in the strategy document.
        for name in strategy.keys() {
            if !self.profiles.contains_key(name) {
                return Err(MiniDbError::UnknownProfile(name.clone()));
            }
        }

        // Binding pass. With several declared candidates for one property the
        // last candidate wins; real data pairs a link property with exactly
        // one concrete type per instance, so any bound candidate resolves the
        // reference the same way.
        let mut bindings = Vec::new();
        for (name, profile) in &self.profiles {
            bindings.push((name.clone(), profile.find_links()?));
        }
        for (name, links) in bindings {
            let profile = self
                .profiles
                .get_mut(&name)
                .expect("binding pass iterates existing profiles");
            for (prop_name, target) in links {
                profile.links.insert(prop_name, target);
            }
        }

        Ok(())
    }
}

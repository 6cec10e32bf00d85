//! Logical-id resolution.
//!
//! Definitions reference each other through author-time logical ids. Once
//! the referenced artifacts exist remotely, those ids are swapped for the
//! runtime ids the workspace assigned.
//!
//! Substitution is plain text replacement by default: every literal
//! occurrence of a logical id is rewritten, including occurrences that are
//! only a substring of unrelated data. `SubstitutionMode::Structural` limits
//! replacement to whole string values.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::adapters::WorkspaceApi;
use crate::bundle::find_descriptor_files;
use crate::domain::descriptor::{DescriptorFile, SENTINEL_LOGICAL_ID};
use crate::domain::remote::find_by_name_and_type;
use crate::error::Result;

/// How logical ids are located in a definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionMode {
    /// Replace every literal occurrence
    #[default]
    Textual,

    /// Replace only whole string values (quoted occurrences in text)
    Structural,
}

/// Result of a substitution pass
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution<T> {
    pub value: T,

    /// Distinct logical ids that were found and replaced
    pub replaced: usize,
}

/// Mapping from logical id to the real id observed in the workspace.
///
/// Values are only ever ids taken from a remote listing or a create
/// response, never placeholders. The sentinel logical id is never a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogicalIdMap {
    entries: BTreeMap<String, String>,
}

impl LogicalIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping, returning the previous real id if one existed.
    ///
    /// The sentinel logical id is dropped with a warning.
    pub fn insert(&mut self, logical_id: impl Into<String>, real_id: impl Into<String>) -> Option<String> {
        let logical_id = logical_id.into();
        if logical_id == SENTINEL_LOGICAL_ID {
            warn!("Refusing to map the sentinel logical id");
            return None;
        }
        self.entries.insert(logical_id, real_id.into())
    }

    pub fn get(&self, logical_id: &str) -> Option<&str> {
        self.entries.get(logical_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace logical ids in raw text
    pub fn apply_to_text(&self, text: &str, mode: SubstitutionMode) -> Substitution<String> {
        let mut out = text.to_string();
        let mut replaced = 0;

        for (logical_id, real_id) in self.iter() {
            let (needle, replacement) = match mode {
                SubstitutionMode::Textual => (logical_id.to_string(), real_id.to_string()),
                SubstitutionMode::Structural => {
                    (format!("\"{}\"", logical_id), format!("\"{}\"", real_id))
                }
            };

            if out.contains(&needle) {
                out = out.replace(&needle, &replacement);
                replaced += 1;
                debug!(%logical_id, %real_id, "Replaced logical id");
            }
        }

        Substitution {
            value: out,
            replaced,
        }
    }

    /// Replace logical ids in a JSON value
    pub fn apply_to_value(&self, value: &Value, mode: SubstitutionMode) -> Result<Substitution<Value>> {
        match mode {
            SubstitutionMode::Textual => {
                let text = serde_json::to_string(value)?;
                let substituted = self.apply_to_text(&text, mode);
                Ok(Substitution {
                    value: serde_json::from_str(&substituted.value)?,
                    replaced: substituted.replaced,
                })
            }
            SubstitutionMode::Structural => {
                let mut value = value.clone();
                let mut seen = HashSet::new();
                self.replace_strings(&mut value, &mut seen);
                Ok(Substitution {
                    value,
                    replaced: seen.len(),
                })
            }
        }
    }

    /// Serialize a definition, substitute, and parse it back
    pub fn apply<T>(&self, definition: &T, mode: SubstitutionMode) -> Result<Substitution<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let value = serde_json::to_value(definition)?;
        let substituted = self.apply_to_value(&value, mode)?;

        if substituted.replaced > 0 {
            info!(count = substituted.replaced, "Replaced logical id(s) in definition");
        } else {
            debug!("No logical ids found in definition");
        }

        Ok(Substitution {
            value: serde_json::from_value(substituted.value)?,
            replaced: substituted.replaced,
        })
    }

    fn replace_strings(&self, value: &mut Value, seen: &mut HashSet<String>) {
        match value {
            Value::String(s) => {
                if let Some(real_id) = self.entries.get(s.as_str()) {
                    seen.insert(s.clone());
                    *s = real_id.clone();
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.replace_strings(item, seen);
                }
            }
            Value::Object(map) => {
                for (_, v) in map.iter_mut() {
                    self.replace_strings(v, seen);
                }
            }
            _ => {}
        }
    }
}

impl FromIterator<(String, String)> for LogicalIdMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .filter(|(logical_id, _)| logical_id != SENTINEL_LOGICAL_ID)
                .collect(),
        }
    }
}

/// Builds logical-id maps against a remote workspace
pub struct LogicalIdResolver {
    api: Arc<dyn WorkspaceApi>,
}

impl LogicalIdResolver {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self { api }
    }

    /// Map every logical id in the bundle to the id of the workspace artifact
    /// with the same display name and type.
    ///
    /// Descriptors missing a field, unreadable descriptors, and failed
    /// inventory lookups are logged and skipped. Only a missing bundle root
    /// is an error.
    #[instrument(skip(self, bundle_root), fields(root = %bundle_root.display()))]
    pub async fn scan(&self, bundle_root: &Path, workspace_id: &str) -> Result<LogicalIdMap> {
        let files = find_descriptor_files(bundle_root)?;
        let mut map = LogicalIdMap::new();

        info!(count = files.len(), "Scanning descriptors for logical ids");

        for path in files {
            let file = match DescriptorFile::read(&path) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Error processing descriptor");
                    continue;
                }
            };

            let Some((display_name, artifact_type, logical_id)) = file.identity() else {
                continue;
            };

            if logical_id == SENTINEL_LOGICAL_ID {
                warn!(
                    path = %path.display(),
                    %display_name,
                    "Descriptor still has the sentinel logical id, not mapped"
                );
                continue;
            }

            // Fresh listing per descriptor so artifacts created meanwhile are seen
            let items = match self.api.list_items(workspace_id).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(%display_name, error = %e, "Could not resolve item");
                    continue;
                }
            };

            if let Some(item) = find_by_name_and_type(&items, display_name, artifact_type) {
                debug!(
                    %artifact_type,
                    %display_name,
                    %logical_id,
                    real_id = %item.id,
                    "Mapped logical id"
                );
                if let Some(previous) = map.insert(logical_id, item.id.clone()) {
                    if previous != item.id {
                        warn!(%logical_id, %previous, current = %item.id, "Logical id mapped twice");
                    }
                }
            }
        }

        info!(mappings = map.len(), "Logical id scanning completed");
        Ok(map)
    }
}

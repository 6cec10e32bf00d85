//! Artifact definitions: a descriptor plus its payload parts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::descriptor::ArtifactDescriptor;

/// File extensions whose content is eligible for logical-id substitution
pub const TEXT_EXTENSIONS: &[&str] = &["json", "py", "sql", "kql", "txt"];

/// How a payload part is treated before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    /// UTF-8 text with a text-like extension
    Text,

    /// Anything else; uploaded unmodified
    Binary,
}

impl PartKind {
    /// Classify a part from its path and raw content
    pub fn classify(relative_path: &str, bytes: &[u8]) -> Self {
        let text_like = Path::new(relative_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if text_like && std::str::from_utf8(bytes).is_ok() {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

/// One payload file of an artifact definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionPart {
    /// Path relative to the artifact directory, forward slashes
    pub path: String,

    pub bytes: Vec<u8>,

    pub kind: PartKind,
}

impl DefinitionPart {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let path = path.into();
        let kind = PartKind::classify(&path, &bytes);
        Self { path, bytes, kind }
    }
}

/// A descriptor with its ordered payload parts (descriptor file excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDefinition {
    pub descriptor: ArtifactDescriptor,
    pub parts: Vec<DefinitionPart>,
}

impl ArtifactDefinition {
    /// Descriptor-only artifacts have nothing to upload
    pub fn is_descriptor_only(&self) -> bool {
        self.parts.is_empty()
    }
}

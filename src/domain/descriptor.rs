//! Artifact descriptors (`.platform` files).
//!
//! Every artifact directory in a bundle carries exactly one descriptor with
//! the artifact's display name, type, and author-time logical id.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// Reserved file name of the metadata descriptor inside an artifact directory
pub const DESCRIPTOR_FILE_NAME: &str = ".platform";

/// Placeholder logical id that must never reach a deployment call
pub const SENTINEL_LOGICAL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Author-time metadata for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub display_name: String,

    /// Artifact type (e.g. "Lakehouse", "Notebook"); open set
    pub artifact_type: String,

    /// Author-assigned placeholder id, not unique across bundles
    pub logical_id: String,

    pub description: Option<String>,
}

/// On-disk descriptor schema. Every field is optional so partially filled
/// descriptors can still be inspected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptorFile {
    #[serde(default)]
    pub metadata: DescriptorMetadata,
    #[serde(default)]
    pub config: DescriptorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorMetadata {
    #[serde(rename = "type")]
    pub artifact_type: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorConfig {
    pub version: Option<String>,
    pub logical_id: Option<String>,
}

impl DescriptorFile {
    /// Parse descriptor JSON
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| DeployError::MalformedDescriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a descriptor from disk
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// The (displayName, type, logicalId) triple, if all three are present
    /// and non-empty
    pub fn identity(&self) -> Option<(&str, &str, &str)> {
        let name = self.metadata.display_name.as_deref().filter(|s| !s.is_empty())?;
        let kind = self.metadata.artifact_type.as_deref().filter(|s| !s.is_empty())?;
        let logical_id = self.config.logical_id.as_deref().filter(|s| !s.is_empty())?;
        Some((name, kind, logical_id))
    }

    /// Convert into a complete descriptor, failing if a required field is missing
    pub fn into_descriptor(self, path: &Path) -> Result<ArtifactDescriptor> {
        let missing = |field: &str| DeployError::MalformedDescriptor {
            path: path.to_path_buf(),
            reason: format!("missing {}", field),
        };

        let display_name = self
            .metadata
            .display_name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("metadata.displayName"))?;
        let artifact_type = self
            .metadata
            .artifact_type
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("metadata.type"))?;
        let logical_id = self
            .config
            .logical_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("config.logicalId"))?;

        Ok(ArtifactDescriptor {
            display_name,
            artifact_type,
            logical_id,
            description: self.metadata.description.filter(|s| !s.is_empty()),
        })
    }
}

impl ArtifactDescriptor {
    /// Whether this descriptor still carries the all-zero placeholder id
    pub fn has_sentinel_id(&self) -> bool {
        self.logical_id == SENTINEL_LOGICAL_ID
    }
}

/// Whether a file name denotes a descriptor (`.platform` or `*.platform`)
pub fn is_descriptor_name(file_name: &str) -> bool {
    file_name.ends_with(DESCRIPTOR_FILE_NAME)
}

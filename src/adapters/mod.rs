//! Adapter interfaces for the remote workspace.
//!
//! Adapters provide a unified interface for the inventory, create,
//! definition-upload and folder calls the engine needs.

pub mod fabric;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{DefinitionPart, RemoteArtifact, RemoteFolder};
use crate::error::Result;

// Re-export the Fabric REST client
pub use fabric::FabricClient;

/// Payload for creating an artifact without a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub display_name: String,

    #[serde(rename = "type")]
    pub artifact_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Trait for remote workspace backends
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// List every artifact in a workspace
    async fn list_items(&self, workspace_id: &str) -> Result<Vec<RemoteArtifact>>;

    /// Create an artifact without a definition and return its id.
    ///
    /// An existing artifact with the same name and type is reported as
    /// `DeployError::RemoteConflict`.
    async fn create_item(&self, workspace_id: &str, request: &CreateItemRequest) -> Result<String>;

    /// Replace an artifact's definition with the given parts
    async fn update_definition(
        &self,
        workspace_id: &str,
        item_id: &str,
        parts: &[DefinitionPart],
    ) -> Result<()>;

    /// List every folder in a workspace
    async fn list_folders(&self, workspace_id: &str) -> Result<Vec<RemoteFolder>>;

    /// Move an artifact into a folder
    async fn move_item(&self, workspace_id: &str, item_id: &str, folder_id: &str) -> Result<()>;

    /// Whether a richer accessibility probe exists for this artifact type
    fn has_detailed_probe(&self, _artifact_type: &str) -> bool {
        false
    }

    /// Probe an artifact beyond its presence in the listing
    async fn probe_item(&self, _workspace_id: &str, _item: &RemoteArtifact) -> Result<()> {
        Ok(())
    }
}

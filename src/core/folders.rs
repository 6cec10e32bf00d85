//! Folder organisation of deployed artifacts.
//!
//! Folders are looked up by display name; artifacts by (name, type) as in
//! every other workspace lookup.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::adapters::WorkspaceApi;
use crate::domain::remote::find_by_name_and_type;
use crate::error::{DeployError, Result};

/// Result of moving one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedItem {
    pub item_id: String,
    pub folder_id: String,
}

/// Moves artifacts into workspace folders
pub struct FolderOrganizer {
    api: Arc<dyn WorkspaceApi>,
}

impl FolderOrganizer {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self { api }
    }

    /// Id of the first folder with this display name
    pub async fn folder_id(&self, workspace_id: &str, folder_name: &str) -> Result<Option<String>> {
        let folders = self.api.list_folders(workspace_id).await?;
        Ok(folders
            .into_iter()
            .find(|f| f.display_name == folder_name)
            .map(|f| f.id))
    }

    /// Move the artifact with this name and type into the named folder.
    ///
    /// A missing artifact or folder is `NotFound`; nothing is moved.
    #[instrument(skip(self))]
    pub async fn move_to_folder(
        &self,
        workspace_id: &str,
        display_name: &str,
        artifact_type: &str,
        folder_name: &str,
    ) -> Result<MovedItem> {
        let items = self.api.list_items(workspace_id).await?;
        let item_id = find_by_name_and_type(&items, display_name, artifact_type)
            .map(|item| item.id.clone())
            .ok_or_else(|| DeployError::not_found(artifact_type, display_name))?;
        debug!(%item_id, "Found item");

        let folder_id = self
            .folder_id(workspace_id, folder_name)
            .await?
            .ok_or_else(|| DeployError::not_found("Folder", folder_name))?;
        debug!(%folder_id, "Found folder");

        self.api.move_item(workspace_id, &item_id, &folder_id).await?;
        info!("{} '{}' moved to folder '{}'", artifact_type, display_name, folder_name);

        Ok(MovedItem { item_id, folder_id })
    }
}

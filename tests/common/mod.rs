//! Shared fixtures: an in-memory workspace and bundle builders.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use fabdeploy::adapters::{CreateItemRequest, WorkspaceApi};
use fabdeploy::domain::{DefinitionPart, RemoteArtifact, RemoteFolder};
use fabdeploy::error::{DeployError, Result};

#[derive(Default)]
struct State {
    items: Vec<RemoteArtifact>,
    next_id: usize,
    created: Vec<CreateItemRequest>,
    uploads: Vec<(String, Vec<DefinitionPart>)>,
    list_calls: usize,
    fail_lists: usize,
    fail_creates: usize,
    hide_on_conflict: bool,
    folders: Vec<RemoteFolder>,
    moves: Vec<(String, String)>,
}

/// Workspace kept in memory; ids are assigned as "id-1", "id-2", ...
#[derive(Default)]
pub struct FakeWorkspace {
    state: Mutex<State>,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workspace pre-populated with (id, name, type) items
    pub fn with_items(items: &[(&str, &str, &str)]) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.state.lock().unwrap();
            for (id, name, kind) in items {
                state.items.push(RemoteArtifact::new(*id, *name, *kind));
            }
        }
        fake
    }

    /// Add (id, name) folders
    pub fn with_folders(self, folders: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for (id, name) in folders {
                state.folders.push(RemoteFolder::new(*id, *name));
            }
        }
        self
    }

    /// Make the next `n` listings fail
    pub fn fail_next_lists(&self, n: usize) {
        self.state.lock().unwrap().fail_lists = n;
    }

    /// Make the next `n` create calls fail
    pub fn fail_next_creates(&self, n: usize) {
        self.state.lock().unwrap().fail_creates = n;
    }

    /// Report conflicts for existing items but omit them from listings
    pub fn hide_items_on_conflict(&self) {
        self.state.lock().unwrap().hide_on_conflict = true;
    }

    pub fn items(&self) -> Vec<RemoteArtifact> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn created(&self) -> Vec<CreateItemRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<DefinitionPart>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Recorded (item id, folder id) moves
    pub fn moves(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Uploaded text of one part of an item
    pub fn uploaded_text(&self, item_id: &str, part_path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .uploads
            .iter()
            .rev()
            .find(|(id, _)| id == item_id)
            .and_then(|(_, parts)| parts.iter().find(|p| p.path == part_path))
            .map(|p| String::from_utf8_lossy(&p.bytes).into_owned())
    }
}

#[async_trait]
impl WorkspaceApi for FakeWorkspace {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_items(&self, _workspace_id: &str) -> Result<Vec<RemoteArtifact>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_lists > 0 {
            state.fail_lists -= 1;
            return Err(DeployError::remote(503, "Service unavailable"));
        }
        if state.hide_on_conflict {
            return Ok(Vec::new());
        }
        Ok(state.items.clone())
    }

    async fn create_item(&self, _workspace_id: &str, request: &CreateItemRequest) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_creates > 0 {
            state.fail_creates -= 1;
            return Err(DeployError::remote(500, "Internal error"));
        }

        if state
            .items
            .iter()
            .any(|i| i.matches(&request.display_name, &request.artifact_type))
        {
            return Err(DeployError::RemoteConflict {
                display_name: request.display_name.clone(),
                artifact_type: request.artifact_type.clone(),
            });
        }

        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        state.items.push(RemoteArtifact::new(
            id.clone(),
            request.display_name.clone(),
            request.artifact_type.clone(),
        ));
        state.created.push(request.clone());
        Ok(id)
    }

    async fn update_definition(
        &self,
        _workspace_id: &str,
        item_id: &str,
        parts: &[DefinitionPart],
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push((item_id.to_string(), parts.to_vec()));
        Ok(())
    }

    async fn list_folders(&self, _workspace_id: &str) -> Result<Vec<RemoteFolder>> {
        Ok(self.state.lock().unwrap().folders.clone())
    }

    async fn move_item(&self, _workspace_id: &str, item_id: &str, folder_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.folders.iter().any(|f| f.id == folder_id) {
            return Err(DeployError::remote(404, "FolderNotFound"));
        }
        state.moves.push((item_id.to_string(), folder_id.to_string()));
        Ok(())
    }
}

/// Write an artifact directory with a descriptor and payload files
pub fn write_item(
    root: &Path,
    dir: &str,
    kind: &str,
    name: &str,
    logical_id: &str,
    files: &[(&str, &str)],
) {
    let item_dir = root.join(dir);
    std::fs::create_dir_all(&item_dir).unwrap();

    let descriptor = serde_json::json!({
        "$schema": "https://developer.microsoft.com/json-schemas/fabric/gitIntegration/platformProperties/2.0.0/schema.json",
        "metadata": {"type": kind, "displayName": name},
        "config": {"version": "2.0", "logicalId": logical_id}
    });
    std::fs::write(
        item_dir.join(".platform"),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();

    for (path, content) in files {
        let file = item_dir.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
    }
}

/// Logical id currently stored in an item's descriptor
pub fn read_logical_id(root: &Path, dir: &str) -> String {
    let content = std::fs::read_to_string(root.join(dir).join(".platform")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    value["config"]["logicalId"].as_str().unwrap().to_string()
}

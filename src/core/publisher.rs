//! Publishing artifacts from a bundle into a workspace.
//!
//! `ArtifactPublisher` handles a single artifact (create-or-find, then
//! upload the definition). `BundlePublisher` is the stage-level operation:
//! it publishes every bundle artifact whose type is in scope.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::resolver::{LogicalIdMap, LogicalIdResolver, SubstitutionMode};
use crate::adapters::{CreateItemRequest, WorkspaceApi};
use crate::bundle::DefinitionStore;
use crate::domain::remote::find_by_name_and_type;
use crate::domain::{DefinitionPart, PartKind};
use crate::error::{DeployError, Result};

/// Result of publishing one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedItem {
    /// Real id of the artifact (new or pre-existing)
    pub id: String,
    pub display_name: String,
    pub artifact_type: String,

    /// False when the artifact already existed
    pub created: bool,
    pub parts_uploaded: usize,

    /// Logical-id replacements, summed over parts
    pub ids_replaced: usize,
}

/// Result of one stage-level publish call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub items: Vec<PublishedItem>,
}

/// Parameters of one publish attempt
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub stage_index: usize,

    /// 1-based attempt number within the stage
    pub attempt: u32,

    /// Artifact types in scope; `None` means every type
    pub item_types: Option<&'a [String]>,

    /// Effective non-empty-workspace override for this attempt
    pub allow_non_empty_workspace: bool,
}

impl PublishRequest<'_> {
    /// Whether an artifact type is in scope for this request
    pub fn in_scope(&self, artifact_type: &str) -> bool {
        match self.item_types {
            None => true,
            Some(types) if types.is_empty() => true,
            Some(types) => types.iter().any(|t| t == artifact_type),
        }
    }
}

/// The "publish items of these types" operation
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, workspace_id: &str, request: &PublishRequest<'_>) -> Result<PublishSummary>;
}

/// Create-or-update of a single artifact with logical-id rewrite
pub struct ArtifactPublisher {
    api: Arc<dyn WorkspaceApi>,
    store: DefinitionStore,
    mode: SubstitutionMode,
}

impl ArtifactPublisher {
    pub fn new(api: Arc<dyn WorkspaceApi>, store: DefinitionStore) -> Self {
        Self {
            api,
            store,
            mode: SubstitutionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: SubstitutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn store(&self) -> &DefinitionStore {
        &self.store
    }

    /// Create the artifact (or find the existing one) and upload its definition.
    ///
    /// Descriptor-only artifacts skip the upload.
    #[instrument(skip_all, fields(item_type = %item_type, path = %relative_path))]
    pub async fn create_or_update(
        &self,
        item_type: &str,
        relative_path: &str,
        workspace_id: &str,
        logical_ids: Option<&LogicalIdMap>,
    ) -> Result<PublishedItem> {
        let definition = self.store.read_definition(relative_path)?;
        let descriptor = &definition.descriptor;

        if descriptor.artifact_type != item_type {
            warn!(
                descriptor_type = %descriptor.artifact_type,
                "Descriptor type differs from requested type"
            );
        }

        info!(display_name = %descriptor.display_name, "Creating {} item", item_type);

        let request = CreateItemRequest {
            display_name: descriptor.display_name.clone(),
            artifact_type: item_type.to_string(),
            description: descriptor.description.clone(),
        };

        let (id, created) = match self.api.create_item(workspace_id, &request).await {
            Ok(id) => {
                info!(%id, "{} item created", item_type);
                (id, true)
            }
            Err(DeployError::RemoteConflict { .. }) => {
                info!(
                    display_name = %descriptor.display_name,
                    "{} already exists, retrieving existing item", item_type
                );
                let items = self.api.list_items(workspace_id).await?;
                let existing = find_by_name_and_type(&items, &descriptor.display_name, item_type)
                    .ok_or_else(|| {
                        DeployError::Inconsistency(format!(
                            "create reported a conflict but {} '{}' is not in the listing",
                            item_type, descriptor.display_name
                        ))
                    })?;
                (existing.id.clone(), false)
            }
            Err(e) => return Err(e),
        };

        if definition.is_descriptor_only() {
            info!("No definition files found, skipping definition update");
            return Ok(PublishedItem {
                id,
                display_name: descriptor.display_name.clone(),
                artifact_type: item_type.to_string(),
                created,
                parts_uploaded: 0,
                ids_replaced: 0,
            });
        }

        let mut ids_replaced = 0;
        let parts: Vec<DefinitionPart> = definition
            .parts
            .iter()
            .map(|part| match (logical_ids, part.kind) {
                (Some(map), PartKind::Text) if !map.is_empty() => {
                    let text = String::from_utf8_lossy(&part.bytes);
                    let substituted = map.apply_to_text(&text, self.mode);
                    if substituted.replaced > 0 {
                        debug!(part = %part.path, count = substituted.replaced, "Replaced logical ids");
                    }
                    ids_replaced += substituted.replaced;
                    DefinitionPart {
                        path: part.path.clone(),
                        bytes: substituted.value.into_bytes(),
                        kind: PartKind::Text,
                    }
                }
                _ => part.clone(),
            })
            .collect();

        info!(count = parts.len(), "Uploading definition file(s)");
        self.api.update_definition(workspace_id, &id, &parts).await?;

        info!(display_name = %descriptor.display_name, %id, "{} deployment completed", item_type);

        Ok(PublishedItem {
            id,
            display_name: descriptor.display_name.clone(),
            artifact_type: item_type.to_string(),
            created,
            parts_uploaded: parts.len(),
            ids_replaced,
        })
    }
}

/// Publishes every bundle artifact in scope, resolving logical ids first
pub struct BundlePublisher {
    artifacts: ArtifactPublisher,
    resolver: LogicalIdResolver,
    resolve_logical_ids: bool,
}

impl BundlePublisher {
    pub fn new(api: Arc<dyn WorkspaceApi>, bundle_root: impl AsRef<Path>) -> Self {
        let store = DefinitionStore::new(bundle_root.as_ref());
        Self {
            artifacts: ArtifactPublisher::new(api.clone(), store),
            resolver: LogicalIdResolver::new(api),
            resolve_logical_ids: true,
        }
    }

    pub fn with_mode(mut self, mode: SubstitutionMode) -> Self {
        self.artifacts = self.artifacts.with_mode(mode);
        self
    }

    /// Disable the logical-id scan (definitions are uploaded verbatim)
    pub fn without_logical_ids(mut self) -> Self {
        self.resolve_logical_ids = false;
        self
    }
}

#[async_trait]
impl Publisher for BundlePublisher {
    async fn publish(&self, workspace_id: &str, request: &PublishRequest<'_>) -> Result<PublishSummary> {
        let store = self.artifacts.store();
        let items: Vec<_> = store
            .items()?
            .into_iter()
            .filter(|item| request.in_scope(&item.descriptor.artifact_type))
            .collect();

        match request.item_types {
            Some(types) if !types.is_empty() => {
                info!(types = %types.join(", "), count = items.len(), "Publishing items in scope")
            }
            _ => info!(count = items.len(), "Publishing all items"),
        }

        if items.is_empty() {
            return Ok(PublishSummary::default());
        }

        let mut logical_ids = if self.resolve_logical_ids {
            Some(self.resolver.scan(store.root(), workspace_id).await?)
        } else {
            None
        };

        let mut summary = PublishSummary::default();
        for item in items {
            let published = self
                .artifacts
                .create_or_update(
                    &item.descriptor.artifact_type,
                    &item.relative_path,
                    workspace_id,
                    logical_ids.as_ref(),
                )
                .await?;

            // Later items in this call may reference the one just published
            if let Some(map) = logical_ids.as_mut() {
                if item.descriptor.has_sentinel_id() {
                    warn!(
                        path = %item.relative_path,
                        "Published item has the sentinel logical id, not mapped"
                    );
                } else {
                    map.insert(item.descriptor.logical_id.clone(), published.id.clone());
                }
            }
            summary.items.push(published);
        }

        Ok(summary)
    }
}

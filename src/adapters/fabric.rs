//! Fabric REST API client.
//!
//! Uses the generic `items` endpoints so one client covers every artifact
//! type. Authentication is a bearer token supplied by the caller.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CreateItemRequest, WorkspaceApi};
use crate::domain::{DefinitionPart, RemoteArtifact, RemoteFolder};
use crate::error::{DeployError, Result};

/// Default API root
pub const DEFAULT_API_ROOT: &str = "https://api.fabric.microsoft.com";

/// Error code Fabric returns (with 400) for a duplicate display name
const NAME_IN_USE_CODE: &str = "ItemDisplayNameAlreadyInUse";

/// Artifact types with a richer accessibility probe than listing presence
const PROBED_TYPES: &[&str] = &["Lakehouse", "Notebook"];

/// Upper bound on continuation pages followed by one listing
const MAX_LIST_PAGES: usize = 1000;

/// Fabric REST client
pub struct FabricClient {
    /// API root, without trailing slash
    api_root: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    continuation_uri: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveItemRequest<'a> {
    target_folder_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedItem {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadPart<'a> {
    path: &'a str,
    payload: String,
    payload_type: &'static str,
}

#[derive(Debug, Serialize)]
struct PartsEnvelope<'a> {
    parts: Vec<PayloadPart<'a>>,
}

#[derive(Debug, Serialize)]
struct UpdateDefinitionRequest<'a> {
    definition: PartsEnvelope<'a>,
}

impl FabricClient {
    /// Create a client with a 120s request timeout
    pub fn new(api_root: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_root, token, Duration::from_secs(120))
    }

    pub fn with_timeout(
        api_root: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_root: api_root.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_root, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| DeployError::transport(format!("Invalid response from {}: {}", url, e)))
    }

    /// Collect a listing across `continuationUri` pages. A repeated
    /// continuation or more than `MAX_LIST_PAGES` pages is an error.
    async fn get_paged<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut values = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            if !seen.insert(url.clone()) {
                return Err(DeployError::transport(format!(
                    "Listing repeated continuation {}",
                    url
                )));
            }
            if seen.len() > MAX_LIST_PAGES {
                return Err(DeployError::transport(format!(
                    "Listing exceeded {} pages",
                    MAX_LIST_PAGES
                )));
            }

            let page: ListPage<T> = self.get_json(&url).await?;
            values.extend(page.value);
            next = page.continuation_uri.filter(|u| !u.is_empty());
        }

        Ok(values)
    }
}

#[async_trait]
impl WorkspaceApi for FabricClient {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn list_items(&self, workspace_id: &str) -> Result<Vec<RemoteArtifact>> {
        let items: Vec<RemoteArtifact> = self
            .get_paged(self.api_url(&format!("workspaces/{}/items", workspace_id)))
            .await?;

        debug!(workspace_id, count = items.len(), "Listed workspace items");
        Ok(items)
    }

    async fn create_item(&self, workspace_id: &str, request: &CreateItemRequest) -> Result<String> {
        let url = self.api_url(&format!("workspaces/{}/items", workspace_id));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("POST {}: {}", url, e)))?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => {
                let created: CreatedItem = response.json().await.map_err(|e| {
                    DeployError::transport(format!("Invalid create response: {}", e))
                })?;
                Ok(created.id)
            }
            // Long-running creation: the item shows up in the listing once accepted
            202 => {
                let items = self.list_items(workspace_id).await?;
                crate::domain::remote::find_by_name_and_type(
                    &items,
                    &request.display_name,
                    &request.artifact_type,
                )
                .map(|item| item.id.clone())
                .ok_or_else(|| {
                    DeployError::remote(
                        202,
                        format!(
                            "Creation of {} '{}' accepted but not yet visible",
                            request.artifact_type, request.display_name
                        ),
                    )
                })
            }
            409 => Err(conflict(request)),
            _ => {
                let text = response.text().await.unwrap_or_default();
                if status == 400 && text.contains(NAME_IN_USE_CODE) {
                    return Err(conflict(request));
                }
                Err(DeployError::remote(status, text))
            }
        }
    }

    async fn update_definition(
        &self,
        workspace_id: &str,
        item_id: &str,
        parts: &[DefinitionPart],
    ) -> Result<()> {
        let url = self.api_url(&format!(
            "workspaces/{}/items/{}/updateDefinition",
            workspace_id, item_id
        ));

        let engine = base64::engine::general_purpose::STANDARD;
        let body = UpdateDefinitionRequest {
            definition: PartsEnvelope {
                parts: parts
                    .iter()
                    .map(|part| PayloadPart {
                        path: &part.path,
                        payload: engine.encode(&part.bytes),
                        payload_type: "InlineBase64",
                    })
                    .collect(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("POST {}: {}", url, e)))?;

        match response.status().as_u16() {
            200 | 202 => Ok(()),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn list_folders(&self, workspace_id: &str) -> Result<Vec<RemoteFolder>> {
        let folders: Vec<RemoteFolder> = self
            .get_paged(self.api_url(&format!("workspaces/{}/folders", workspace_id)))
            .await?;

        debug!(workspace_id, count = folders.len(), "Listed workspace folders");
        Ok(folders)
    }

    async fn move_item(&self, workspace_id: &str, item_id: &str, folder_id: &str) -> Result<()> {
        let url = self.api_url(&format!("workspaces/{}/items/{}/move", workspace_id, item_id));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&MoveItemRequest {
                target_folder_id: folder_id,
            })
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("POST {}: {}", url, e)))?;

        match response.status().as_u16() {
            200 => Ok(()),
            _ => Err(error_from_response(response).await),
        }
    }

    fn has_detailed_probe(&self, artifact_type: &str) -> bool {
        PROBED_TYPES.contains(&artifact_type)
    }

    async fn probe_item(&self, workspace_id: &str, item: &RemoteArtifact) -> Result<()> {
        let url = self.api_url(&format!("workspaces/{}/items/{}", workspace_id, item.id));
        let _: RemoteArtifact = self.get_json(&url).await?;
        Ok(())
    }
}

fn conflict(request: &CreateItemRequest) -> DeployError {
    DeployError::RemoteConflict {
        display_name: request.display_name.clone(),
        artifact_type: request.artifact_type.clone(),
    }
}

async fn error_from_response(response: reqwest::Response) -> DeployError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    DeployError::remote(status, text)
}

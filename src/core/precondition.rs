//! Workspace precondition: the target workspace must be empty apart from
//! the artifact the deployment is driven from, if there is one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::adapters::WorkspaceApi;
use crate::domain::SelfPolicy;
use crate::error::{DeployError, Result, UnexpectedArtifact};

/// Passing outcomes of a precondition check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PreconditionOutcome {
    /// The workspace has no artifacts at all
    Empty,

    /// The only artifacts are the self artifact
    OnlySelf,

    /// The driving artifact could not be determined, so the check was not
    /// performed
    Skipped { reason: String },
}

/// Checks that a workspace holds no unexpected artifacts
pub struct PreconditionValidator {
    api: Arc<dyn WorkspaceApi>,
    self_policy: SelfPolicy,
}

impl PreconditionValidator {
    pub fn new(api: Arc<dyn WorkspaceApi>, self_policy: SelfPolicy) -> Self {
        Self { api, self_policy }
    }

    /// Run the check.
    ///
    /// Fails with `WorkspaceNotEmpty` listing every unexpected artifact. A
    /// failed inventory listing is returned as is, never treated as a pass.
    #[instrument(skip(self))]
    pub async fn check(&self, workspace_id: &str) -> Result<PreconditionOutcome> {
        if self.self_policy == SelfPolicy::Unknown {
            warn!("Could not determine the self artifact; skipping workspace validation");
            return Ok(PreconditionOutcome::Skipped {
                reason: "self artifact unknown".to_string(),
            });
        }

        let items = self.api.list_items(workspace_id).await?;

        if items.is_empty() {
            info!("Workspace validation passed: workspace is empty");
            return Ok(PreconditionOutcome::Empty);
        }

        let unexpected: Vec<UnexpectedArtifact> = items
            .iter()
            .filter(|item| !self.self_policy.tolerates(item))
            .map(|item| UnexpectedArtifact {
                display_name: item.display_name.clone(),
                artifact_type: item.artifact_type.clone(),
            })
            .collect();

        if let SelfPolicy::Named(me) = &self.self_policy {
            if unexpected.is_empty() {
                info!(
                    self_artifact = %me.display_name,
                    "Workspace validation passed: only contains the self artifact"
                );
                return Ok(PreconditionOutcome::OnlySelf);
            }
        }

        for item in &unexpected {
            error!(item = %item, "Unexpected item in workspace");
        }
        error!(
            count = unexpected.len(),
            "Workspace validation failed; set allow_non_empty_workspace to deploy anyway"
        );

        Err(DeployError::WorkspaceNotEmpty { unexpected })
    }
}

//! Post-deployment verification.
//!
//! Checks that expected artifacts exist and that each listed artifact is
//! reachable. Types the adapter can probe in detail are probed; everything
//! else is verified by presence in the listing alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::adapters::WorkspaceApi;
use crate::domain::remote::find_by_name_and_type;
use crate::error::Result;

/// An artifact the deployment should have produced
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedArtifact {
    pub display_name: String,
    pub artifact_type: String,
}

impl ExpectedArtifact {
    pub fn new(display_name: impl Into<String>, artifact_type: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            artifact_type: artifact_type.into(),
        }
    }
}

/// How an artifact's accessibility was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCheck {
    /// The adapter's detailed probe succeeded
    Probed,

    /// Only presence in the listing was checked
    ExistenceOnly,
}

/// Accessibility result for one artifact
#[derive(Debug, Clone, Serialize)]
pub struct ItemAccess {
    pub id: String,
    pub display_name: String,
    pub artifact_type: String,
    pub check: AccessCheck,

    /// Set when a detailed probe failed; the artifact still exists
    pub note: Option<String>,
}

/// Result of verifying a workspace
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub workspace_id: String,
    pub checked_at: DateTime<Utc>,
    pub items_by_type: BTreeMap<String, usize>,
    pub missing: Vec<ExpectedArtifact>,
    pub accessibility: Vec<ItemAccess>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.items_by_type.values().sum()
    }

    /// Artifacts whose detailed probe failed
    pub fn failed_probes(&self) -> usize {
        self.accessibility.iter().filter(|a| a.note.is_some()).count()
    }
}

/// Verifies a workspace after deployment
pub struct DeploymentVerifier {
    api: Arc<dyn WorkspaceApi>,
    check_accessibility: bool,
}

impl DeploymentVerifier {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self {
            api,
            check_accessibility: true,
        }
    }

    /// Skip per-item accessibility checks
    pub fn without_accessibility(mut self) -> Self {
        self.check_accessibility = false;
        self
    }

    /// Verify the workspace contents.
    ///
    /// Only a failed listing is an error; missing artifacts and failed
    /// probes are recorded in the report.
    #[instrument(skip(self, expected), fields(expected = expected.len()))]
    pub async fn verify(
        &self,
        workspace_id: &str,
        expected: &[ExpectedArtifact],
    ) -> Result<VerificationReport> {
        let items = self.api.list_items(workspace_id).await?;

        let mut report = VerificationReport {
            workspace_id: workspace_id.to_string(),
            checked_at: Utc::now(),
            items_by_type: BTreeMap::new(),
            missing: Vec::new(),
            accessibility: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        if items.is_empty() {
            report.errors.push("No items found in workspace".to_string());
        }

        for item in &items {
            *report
                .items_by_type
                .entry(item.artifact_type.clone())
                .or_insert(0) += 1;
        }
        info!(count = items.len(), types = report.items_by_type.len(), "Workspace items listed");

        for want in expected {
            if find_by_name_and_type(&items, &want.display_name, &want.artifact_type).is_none() {
                warn!(name = %want.display_name, kind = %want.artifact_type, "Expected item missing");
                report.missing.push(want.clone());
            }
        }
        if !report.missing.is_empty() {
            let names: Vec<String> = report
                .missing
                .iter()
                .map(|m| format!("{} ({})", m.display_name, m.artifact_type))
                .collect();
            report
                .errors
                .push(format!("Missing items: {}", names.join(", ")));
        }

        if self.check_accessibility {
            for item in &items {
                let (check, note) = if self.api.has_detailed_probe(&item.artifact_type) {
                    match self.api.probe_item(workspace_id, item).await {
                        Ok(()) => (AccessCheck::Probed, None),
                        Err(e) => {
                            warn!(name = %item.display_name, error = %e, "Detailed probe failed");
                            (AccessCheck::ExistenceOnly, Some(e.to_string()))
                        }
                    }
                } else {
                    (AccessCheck::ExistenceOnly, None)
                };

                report.accessibility.push(ItemAccess {
                    id: item.id.clone(),
                    display_name: item.display_name.clone(),
                    artifact_type: item.artifact_type.clone(),
                    check,
                    note,
                });
            }

            let failed = report.failed_probes();
            if failed > 0 {
                report.warnings.push(format!(
                    "{} item(s) not fully accessible (existence verified)",
                    failed
                ));
            }
        }

        if report.passed() {
            info!("Post-deployment validation passed");
        } else {
            warn!(errors = report.errors.len(), "Post-deployment validation failed");
        }

        Ok(report)
    }
}

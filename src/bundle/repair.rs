//! Repair of degenerate (all-zero) logical ids in descriptor files.
//!
//! Authoring tools sometimes emit the sentinel id for several artifacts at
//! once, which makes the remote side reject the bundle with duplicate-key
//! errors. Each sentinel is replaced by a fresh UUID, in place.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::store::{find_descriptor_files, relative_slash_path};
use crate::domain::SENTINEL_LOGICAL_ID;
use crate::error::{DeployError, Result};

/// Outcome of one repair scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Descriptor files found
    pub total_files: usize,

    /// Files carrying the sentinel id
    pub files_with_zero_guid: usize,

    /// Files rewritten (or that would be, in dry-run mode)
    pub files_fixed: usize,

    /// Relative paths of the rewritten files
    pub fixed_files: Vec<String>,

    /// Relative paths of files that could not be parsed
    pub malformed_files: Vec<String>,
}

/// Scans a bundle and replaces sentinel logical ids
#[derive(Debug, Clone)]
pub struct DegenerateIdRepairer {
    root: PathBuf,
}

impl DegenerateIdRepairer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scan every descriptor and fix those carrying the sentinel id.
    ///
    /// In dry-run mode the counts are identical but nothing is written.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn scan_and_fix(&self, dry_run: bool) -> Result<RepairReport> {
        let files = find_descriptor_files(&self.root)?;
        let mut report = RepairReport {
            total_files: files.len(),
            ..Default::default()
        };

        debug!(count = files.len(), "Found descriptor files");

        for path in &files {
            let rel = relative_slash_path(&self.root, path);

            let mut data = match read_descriptor_value(path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %rel, error = %e, "Skipping malformed descriptor");
                    report.malformed_files.push(rel);
                    continue;
                }
            };

            if !has_sentinel(&data) {
                continue;
            }
            report.files_with_zero_guid += 1;

            let new_id = Uuid::new_v4().to_string();

            if dry_run {
                info!(path = %rel, new_logical_id = %new_id, "[dry run] Would replace sentinel logicalId");
                report.fixed_files.push(rel);
                continue;
            }

            data["config"]["logicalId"] = Value::String(new_id.clone());
            match write_descriptor_value(path, &data) {
                Ok(()) => {
                    info!(path = %rel, new_logical_id = %new_id, "Replaced sentinel logicalId");
                    report.fixed_files.push(rel);
                }
                Err(e) => warn!(path = %rel, error = %e, "Failed to rewrite descriptor"),
            }
        }

        report.files_fixed = report.fixed_files.len();

        if report.files_with_zero_guid == 0 {
            debug!(total = report.total_files, "All descriptors have valid logicalIds");
        } else {
            info!(
                fixed = report.files_fixed,
                found = report.files_with_zero_guid,
                dry_run,
                "Degenerate logicalId repair finished"
            );
        }

        Ok(report)
    }
}

fn read_descriptor_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| DeployError::MalformedDescriptor {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn has_sentinel(data: &Value) -> bool {
    data.get("config")
        .and_then(|c| c.get("logicalId"))
        .and_then(Value::as_str)
        == Some(SENTINEL_LOGICAL_ID)
}

/// Two-space indentation, original key order, trailing newline
fn write_descriptor_value(path: &Path, data: &Value) -> Result<()> {
    let mut content = serde_json::to_string_pretty(data)?;
    content.push('\n');
    std::fs::write(path, content).map_err(|e| DeployError::io(path, e))
}

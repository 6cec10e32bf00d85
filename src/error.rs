//! Error types for deployment operations.
//!
//! Local recoveries (a malformed descriptor during a scan, one failed
//! inventory lookup) are logged and counted by the operation that hit them.
//! Everything else surfaces through [`DeployError`].

use std::path::PathBuf;

use thiserror::Error;

use crate::core::suggestions::format_suggestions;

/// Result alias for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// An artifact found in a workspace that should not be there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedArtifact {
    pub display_name: String,
    pub artifact_type: String,
}

impl std::fmt::Display for UnexpectedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.artifact_type)
    }
}

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Malformed descriptor {}: {reason}", path.display())]
    MalformedDescriptor { path: PathBuf, reason: String },

    #[error("{artifact_type} '{display_name}' already exists in the workspace")]
    RemoteConflict {
        display_name: String,
        artifact_type: String,
    },

    #[error("{}", remote_message(*status, message))]
    RemoteUnavailable {
        status: Option<u16>,
        message: String,
    },

    #[error(
        "Workspace contains {} existing item(s): {}. Deployment to non-empty workspaces requires explicit confirmation (allow_non_empty_workspace)",
        unexpected.len(),
        join_items(unexpected)
    )]
    WorkspaceNotEmpty { unexpected: Vec<UnexpectedArtifact> },

    #[error(
        "Stage {} failed after {attempts} attempt(s). Last error: {source}{}",
        stage_index + 1,
        format_suggestions(suggestions)
    )]
    RetriesExhausted {
        stage_index: usize,
        attempts: u32,
        #[source]
        source: Box<DeployError>,
        suggestions: Vec<String>,
    },

    #[error("Inconsistent workspace state: {0}")]
    Inconsistency(String),

    #[error("{kind} '{name}' not found in the workspace")]
    NotFound { kind: String, name: String },

    #[error("Deployment cancelled before stage {} completed", stage_index + 1)]
    Cancelled { stage_index: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a remote error with an HTTP status
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a remote error for a failure with no response (transport, timeout)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status: None,
            message: message.into(),
        }
    }

    /// A named workspace entry (artifact or folder) that does not exist
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Stage index carried by the terminal error kinds
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::RetriesExhausted { stage_index, .. } | Self::Cancelled { stage_index } => {
                Some(*stage_index)
            }
            _ => None,
        }
    }
}

fn remote_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Remote call failed ({}): {}", code, message),
        None => format!("Remote call failed: {}", message),
    }
}

fn join_items(items: &[UnexpectedArtifact]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

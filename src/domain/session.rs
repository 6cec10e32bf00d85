//! Per-session deployment state.
//!
//! The precondition flags only ever move from `false` to `true`. A session
//! is owned by one controller at a time; sharing one across concurrent
//! deployments is unsupported.

use serde::Serialize;

/// State carried across the stages and retries of one deployment session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSession {
    workspace_id: String,
    allow_non_empty_workspace: bool,
    precondition_satisfied: bool,
}

impl DeploymentSession {
    /// Start a new session
    pub fn new(workspace_id: impl Into<String>, allow_non_empty_workspace: bool) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            allow_non_empty_workspace,
            precondition_satisfied: false,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn allow_non_empty_workspace(&self) -> bool {
        self.allow_non_empty_workspace
    }

    pub fn precondition_satisfied(&self) -> bool {
        self.precondition_satisfied
    }

    /// Whether the workspace precondition still has to be checked
    pub fn needs_precondition_check(&self) -> bool {
        !self.allow_non_empty_workspace && !self.precondition_satisfied
    }

    /// Record a passed (or deliberately skipped) precondition check
    pub fn mark_precondition_satisfied(&mut self) {
        self.precondition_satisfied = true;
    }

    /// After a failed attempt the workspace may already hold partial results,
    /// so enforcement is switched off for the rest of the session.
    pub fn force_bypass_after_failure(&mut self) {
        self.allow_non_empty_workspace = true;
        self.precondition_satisfied = true;
    }
}

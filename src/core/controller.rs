//! Staged deployment controller.
//!
//! Runs a [`StagePlan`] stage by stage against one workspace, retrying a
//! failed stage after a delay. A failure trips the session's bypass ratchet:
//! every later attempt in the session runs with the non-empty-workspace
//! override on and the precondition check skipped.
//!
//! Completed stages are never rolled back.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::plan::{RetryPolicy, Stage, StagePlan};
use super::precondition::PreconditionValidator;
use super::publisher::{PublishRequest, PublishedItem, Publisher};
use super::suggestions::suggestions_for;
use crate::bundle::{DegenerateIdRepairer, RepairReport};
use crate::domain::DeploymentSession;
use crate::error::{DeployError, Result};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage_index")]
pub enum ControllerState {
    Idle,
    ValidatingPrecondition,
    DeployingStage(usize),
    Retrying(usize),
    StageComplete(usize),
    Done,
    Failed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ValidatingPrecondition => write!(f, "validating_precondition"),
            Self::DeployingStage(n) => write!(f, "deploying_stage({})", n + 1),
            Self::Retrying(n) => write!(f, "retrying({})", n + 1),
            Self::StageComplete(n) => write!(f, "stage_complete({})", n + 1),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One publish attempt, as observed by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub stage_index: usize,

    /// 1-based within the stage
    pub attempt: u32,

    /// Override in effect when the publish call was made
    pub allow_non_empty_workspace: bool,

    /// Whether the precondition validator ran for this attempt
    pub precondition_checked: bool,

    pub error: Option<String>,
}

/// Result of a fully successful staged deployment
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentOutcome {
    pub stages_completed: usize,
    pub attempts: Vec<AttemptRecord>,

    /// One report per repair pass
    pub repairs: Vec<RepairReport>,

    /// Every artifact published, in publish order
    pub items: Vec<PublishedItem>,
}

/// Cancellation signal for retry waits.
///
/// Clones share the signal; cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sequences stages, enforces the workspace precondition once per session,
/// and retries failed stages
pub struct StagedDeploymentController<P> {
    publisher: P,
    validator: PreconditionValidator,
    repairer: Option<DegenerateIdRepairer>,
    retry_policy: RetryPolicy,
    cancel: CancelToken,
    state: ControllerState,
    history: Vec<AttemptRecord>,
}

impl<P: Publisher> StagedDeploymentController<P> {
    pub fn new(publisher: P, validator: PreconditionValidator) -> Self {
        Self {
            publisher,
            validator,
            repairer: None,
            retry_policy: RetryPolicy::default(),
            cancel: CancelToken::new(),
            state: ControllerState::Idle,
            history: Vec::new(),
        }
    }

    /// Run the repairer before every publish attempt
    pub fn with_repairer(mut self, repairer: DegenerateIdRepairer) -> Self {
        self.repairer = Some(repairer);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Attempts made by the most recent run, including failed ones
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Deploy every stage in order.
    ///
    /// Stops at the first stage that exhausts its retries. The error carries
    /// the failing stage index; earlier stages stay deployed.
    #[instrument(skip_all, fields(workspace = %session.workspace_id(), stages = plan.len()))]
    pub async fn run(
        &mut self,
        session: &mut DeploymentSession,
        plan: &StagePlan,
    ) -> Result<DeploymentOutcome> {
        self.history.clear();
        self.state = ControllerState::Idle;

        let mut outcome = DeploymentOutcome::default();
        let total = plan.len();

        for (stage_index, stage) in plan.stages().iter().enumerate() {
            info!(
                stage = stage_index + 1,
                total,
                types = %stage.label(),
                "Deploying stage"
            );

            if let Err(e) = self
                .run_stage(session, stage_index, stage, &mut outcome)
                .await
            {
                self.transition(ControllerState::Failed);
                return Err(e);
            }

            outcome.stages_completed += 1;
            self.transition(ControllerState::StageComplete(stage_index));
            info!(stage = stage_index + 1, total, "Stage completed");
        }

        self.transition(ControllerState::Done);
        outcome.attempts = self.history.clone();

        info!(
            stages = outcome.stages_completed,
            items = outcome.items.len(),
            "Staged deployment completed"
        );
        Ok(outcome)
    }

    async fn run_stage(
        &mut self,
        session: &mut DeploymentSession,
        stage_index: usize,
        stage: &Stage,
        outcome: &mut DeploymentOutcome,
    ) -> Result<()> {
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);

            if self.cancel.is_cancelled() {
                warn!(stage = stage_index + 1, "Deployment cancelled");
                return Err(DeployError::Cancelled { stage_index });
            }

            let precondition_checked = session.needs_precondition_check();
            if precondition_checked {
                self.transition(ControllerState::ValidatingPrecondition);
                // Fatal: never retried, never bypassed
                let checked = self.validator.check(session.workspace_id()).await;
                if let Err(e) = checked {
                    self.record(stage_index, attempt, session, true, Some(&e));
                    return Err(e);
                }
                session.mark_precondition_satisfied();
            } else if session.allow_non_empty_workspace() {
                debug!("Skipping workspace validation (non-empty workspace allowed)");
            }

            self.transition(ControllerState::DeployingStage(stage_index));

            if let Some(repairer) = &self.repairer {
                let report = repairer.scan_and_fix(false)?;
                if report.files_fixed > 0 {
                    info!(fixed = report.files_fixed, "Repaired degenerate logical ids");
                } else if report.files_with_zero_guid > 0 {
                    warn!(
                        found = report.files_with_zero_guid,
                        "Found degenerate logical ids that could not be fixed"
                    );
                }
                outcome.repairs.push(report);
            }

            let request = PublishRequest {
                stage_index,
                attempt,
                item_types: stage.scope(),
                allow_non_empty_workspace: session.allow_non_empty_workspace(),
            };

            let result = self.publisher.publish(session.workspace_id(), &request).await;
            match result {
                Ok(summary) => {
                    self.record(stage_index, attempt, session, precondition_checked, None);
                    outcome.items.extend(summary.items);
                    return Ok(());
                }
                Err(e) => {
                    self.record(stage_index, attempt, session, precondition_checked, Some(&e));

                    if self.retry_policy.should_retry(attempt) {
                        // Earlier attempts may have created artifacts that would
                        // trip the precondition; the bypass is never undone
                        session.force_bypass_after_failure();

                        let delay = self.retry_policy.delay_for_attempt(attempt);
                        self.transition(ControllerState::Retrying(stage_index));

                        warn!(
                            stage = stage_index + 1,
                            attempt,
                            retries_remaining = self.retry_policy.max_attempts().saturating_sub(attempt),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Stage failed, retrying"
                        );

                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.cancel.cancelled() => {
                                warn!(stage = stage_index + 1, "Deployment cancelled during retry wait");
                                return Err(DeployError::Cancelled { stage_index });
                            }
                        }
                        continue;
                    }

                    let suggestions = suggestions_for(&e.to_string());
                    error!(
                        stage = stage_index + 1,
                        attempt,
                        error = %e,
                        "Stage failed permanently"
                    );

                    return Err(DeployError::RetriesExhausted {
                        stage_index,
                        attempts: attempt,
                        source: Box::new(e),
                        suggestions,
                    });
                }
            }
        }
    }

    fn record(
        &mut self,
        stage_index: usize,
        attempt: u32,
        session: &DeploymentSession,
        precondition_checked: bool,
        error: Option<&DeployError>,
    ) {
        self.history.push(AttemptRecord {
            stage_index,
            attempt,
            allow_non_empty_workspace: session.allow_non_empty_workspace(),
            precondition_checked,
            error: error.map(ToString::to_string),
        });
    }

    fn transition(&mut self, next: ControllerState) {
        debug!(from = %self.state, to = %next, "Controller state change");
        self.state = next;
    }
}

//! Stage plans and retry policy.
//!
//! Stages are declared by the operator, in dependency order. The engine
//! trusts that order and never reorders or validates it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// A group of artifact types deployed together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage {
    /// Types in scope; empty means every type
    pub item_types: Vec<String>,
}

impl Stage {
    pub fn new<I, S>(item_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            item_types: item_types.into_iter().map(Into::into).collect(),
        }
    }

    /// A stage that publishes everything
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Scope passed to the publisher (`None` when unscoped)
    pub fn scope(&self) -> Option<&[String]> {
        if self.item_types.is_empty() {
            None
        } else {
            Some(&self.item_types)
        }
    }

    /// Human-readable label, e.g. "Lakehouse, Eventhouse" or "all items"
    pub fn label(&self) -> String {
        if self.item_types.is_empty() {
            "all items".to_string()
        } else {
            self.item_types.join(", ")
        }
    }
}

/// Ordered sequence of stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Build a plan from explicit stages. An empty list means a single
    /// unstaged deployment.
    pub fn new(stages: Vec<Stage>) -> Self {
        if stages.is_empty() {
            Self::single(Stage::unscoped())
        } else {
            Self { stages }
        }
    }

    pub fn single(stage: Stage) -> Self {
        Self {
            stages: vec![stage],
        }
    }

    /// Build a plan from either a flat type list or nested stage lists.
    ///
    /// The two are mutually exclusive.
    pub fn from_options(
        item_types: Option<Vec<String>>,
        item_type_stages: Option<Vec<Vec<String>>>,
    ) -> Result<Self> {
        match (item_types, item_type_stages) {
            (Some(_), Some(_)) => Err(DeployError::Config(
                "item_types and item_type_stages are mutually exclusive; provide only one"
                    .to_string(),
            )),
            (None, Some(stages)) => Ok(Self::new(stages.into_iter().map(Stage::new).collect())),
            (Some(types), None) => Ok(Self::single(Stage::new(types))),
            (None, None) => Ok(Self::single(Stage::unscoped())),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Retry policy for failed stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier; 1.0 keeps the delay fixed
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_initial_delay() -> u64 {
    10_000
}
fn default_max_delay() -> u64 {
    60_000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self {
            max_retries,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Whether another attempt is allowed after `attempt` failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Total attempts allowed, saturating at `u32::MAX`
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

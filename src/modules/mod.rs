//! Provisioning steps
//!
//! Each step is an already-satisfied predicate plus an apply action.
//! Steps are executed in a fixed order by [`crate::runner::StepRunner`].

pub mod cron;
pub mod fail2ban;
pub mod folder;
pub mod groups;
pub mod honeypot;
pub mod packages;
pub mod preflight;
pub mod ssh_keys;
pub mod sshd;
pub mod users;

use crate::ProvisionError;
use crate::state::HostContext;
use async_trait::async_trait;
use serde::Serialize;

/// Step execution frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Evaluate the precondition and apply only when unsatisfied
    UntilSatisfied,
    /// Apply on every run (non-idempotent or inherently idempotent)
    Always,
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The action ran
    Applied,
    /// The precondition already held
    AlreadySatisfied,
    /// Not applicable this run (missing optional input, nothing to match)
    Skipped { reason: String },
    /// The action failed; the run continued
    Failed { error: String },
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::AlreadySatisfied => write!(f, "already satisfied"),
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
            Self::Failed { error } => write!(f, "failed ({})", error),
        }
    }
}

/// Trait for provisioning steps
#[async_trait]
pub trait Step: Send + Sync {
    /// Name of this step
    fn name(&self) -> &'static str;

    /// Execution frequency for this step
    fn frequency(&self) -> Frequency {
        Frequency::UntilSatisfied
    }

    /// Whether a failure of this step aborts the run
    fn is_fatal(&self) -> bool {
        false
    }

    /// Whether the host already has what this step would produce
    async fn is_satisfied(&self, _ctx: &HostContext) -> Result<bool, ProvisionError> {
        Ok(false)
    }

    /// Perform the step
    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(StepOutcome::Applied.to_string(), "applied");
        assert_eq!(
            StepOutcome::skipped("no cron file").to_string(),
            "skipped (no cron file)"
        );
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::skipped("missing")).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "missing");

        let json = serde_json::to_value(StepOutcome::AlreadySatisfied).unwrap();
        assert_eq!(json["status"], "already_satisfied");
    }
}

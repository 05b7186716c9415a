//! Generic step runner
//!
//! Evaluates each step's precondition, applies it when needed, and records
//! the outcome. Fatal step errors abort the run; everything else is logged
//! and the next step still runs.

use crate::ProvisionError;
use crate::modules::{Frequency, Step, StepOutcome};
use crate::state::HostContext;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one step in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Ordered outcomes of a provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn push(&mut self, step: &str, outcome: StepOutcome) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            outcome,
        });
    }

    /// Outcome recorded for `step`, if it ran
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }

    /// Steps that failed without aborting the run
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }

    /// Write the report as pretty JSON
    pub async fn write_json(&self, path: &Path) -> Result<(), ProvisionError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Executes steps against a host
pub struct StepRunner<'a> {
    ctx: &'a HostContext,
}

impl<'a> StepRunner<'a> {
    pub fn new(ctx: &'a HostContext) -> Self {
        Self { ctx }
    }

    /// Run `steps` in order, appending outcomes to `report`
    pub async fn run_all(
        &self,
        steps: &[Box<dyn Step>],
        report: &mut RunReport,
    ) -> Result<(), ProvisionError> {
        for step in steps {
            let outcome = self.run_one(step.as_ref()).await?;
            report.push(step.name(), outcome);
        }
        Ok(())
    }

    /// Run a single step; only fatal step errors are returned
    pub async fn run_one(&self, step: &dyn Step) -> Result<StepOutcome, ProvisionError> {
        let name = step.name();
        debug!(step = name, "Evaluating step");

        let result = match self.check(step).await {
            Ok(true) => Ok(StepOutcome::AlreadySatisfied),
            Ok(false) => step.apply(self.ctx).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                match &outcome {
                    StepOutcome::Applied => info!(step = name, "Applied"),
                    StepOutcome::AlreadySatisfied => {
                        info!(step = name, "Already satisfied, proceeding")
                    }
                    StepOutcome::Skipped { reason } => warn!(step = name, "Skipped: {}", reason),
                    StepOutcome::Failed { error } => warn!(step = name, "Failed: {}", error),
                }
                Ok(outcome)
            }
            Err(e) if step.is_fatal() || e.is_fatal() => Err(e),
            Err(e) => {
                warn!(step = name, "Failed: {}", e);
                Ok(StepOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    async fn check(&self, step: &dyn Step) -> Result<bool, ProvisionError> {
        match step.frequency() {
            Frequency::Always => Ok(false),
            Frequency::UntilSatisfied => step.is_satisfied(self.ctx).await,
        }
    }
}

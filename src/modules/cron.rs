//! Crontab module
//!
//! Replaces the user's crontab with the supplied file verbatim.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::config::existing_input;
use crate::state::HostContext;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

pub struct InstallCrontab {
    user: String,
    file: Option<PathBuf>,
}

impl InstallCrontab {
    pub fn new(user: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            user: user.into(),
            file,
        }
    }
}

#[async_trait]
impl Step for InstallCrontab {
    fn name(&self) -> &'static str {
        "crontab"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let Some(file) = existing_input(self.file.as_deref()) else {
            return Ok(StepOutcome::skipped(match &self.file {
                Some(path) => format!("cron file {} not found", path.display()),
                None => "no cron file supplied".to_string(),
            }));
        };

        let file = file.to_string_lossy();
        ctx.runner
            .run("crontab", &["-u", self.user.as_str(), &*file])
            .await?
            .check("crontab")?;

        info!("Crontab installed for {} from {}", self.user, file);
        Ok(StepOutcome::Applied)
    }
}

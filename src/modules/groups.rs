//! Group creation and membership module

use super::{Step, StepOutcome};
use crate::ProvisionError;
use crate::state::{HostContext, accounts};
use async_trait::async_trait;
use tracing::{debug, info};

/// Creates a group if missing
pub struct EnsureGroup {
    group: String,
}

impl EnsureGroup {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }
}

#[async_trait]
impl Step for EnsureGroup {
    fn name(&self) -> &'static str {
        "group"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        accounts::group_exists(&ctx.paths, &self.group).await
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        info!("Creating group: {}", self.group);

        let output = ctx.runner.run("groupadd", &[self.group.as_str()]).await?;

        // Exit code 9 means group already exists, which is fine
        if !output.success() && output.code != Some(9) {
            return Err(ProvisionError::UserGroup(format!(
                "Failed to create group {}: {}",
                self.group,
                output.stderr.trim()
            )));
        }

        Ok(StepOutcome::Applied)
    }
}

/// Adds a user to a supplementary group if not already a member
pub struct EnsureMembership {
    user: String,
    group: String,
}

impl EnsureMembership {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }
}

#[async_trait]
impl Step for EnsureMembership {
    fn name(&self) -> &'static str {
        "group-membership"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        accounts::is_member(&ctx.paths, &self.user, &self.group).await
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        debug!("Adding user {} to group {}", self.user, self.group);

        let output = ctx
            .runner
            .run(
                "usermod",
                &["--append", "--groups", self.group.as_str(), self.user.as_str()],
            )
            .await?;

        if !output.success() {
            return Err(ProvisionError::UserGroup(format!(
                "Failed to add user {} to group {}: {}",
                self.user,
                self.group,
                output.stderr.trim()
            )));
        }

        info!("User {} added to group {}", self.user, self.group);
        Ok(StepOutcome::Applied)
    }
}

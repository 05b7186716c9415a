//! User creation module

use super::{Step, StepOutcome};
use crate::ProvisionError;
use crate::config::DEFAULT_SHELL;
use crate::exec::CommandRunner;
use crate::prompt::Secret;
use crate::state::{HostContext, accounts};
use async_trait::async_trait;
use tracing::{debug, info};

/// Creates the administrative account with a home directory and password
pub struct CreateUser {
    user: String,
    password: Secret,
}

impl CreateUser {
    pub fn new(user: impl Into<String>, password: Secret) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }
}

#[async_trait]
impl Step for CreateUser {
    fn name(&self) -> &'static str {
        "user-account"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        accounts::user_exists(&ctx.paths, &self.user).await
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        create_user(runner, &self.user).await?;
        set_user_password(runner, &self.user, &self.password).await?;
        info!("User {} created", self.user);
        Ok(StepOutcome::Applied)
    }
}

async fn create_user(runner: &dyn CommandRunner, name: &str) -> Result<(), ProvisionError> {
    info!("Creating user: {}", name);

    let output = runner
        .run("useradd", &["--create-home", "--shell", DEFAULT_SHELL, name])
        .await?;

    // Exit code 9 means user already exists, which is fine
    if !output.success() && output.code != Some(9) {
        return Err(ProvisionError::UserGroup(format!(
            "Failed to create user {}: {}",
            name,
            output.stderr.trim()
        )));
    }

    Ok(())
}

/// Set the user's password; chpasswd hashes it, the plaintext only crosses stdin
async fn set_user_password(
    runner: &dyn CommandRunner,
    username: &str,
    password: &Secret,
) -> Result<(), ProvisionError> {
    debug!("Setting password for user {}", username);

    let input = format!("{}:{}\n", username, password.expose());
    let output = runner.run_with_stdin("chpasswd", &[], input.as_bytes()).await?;

    if !output.success() {
        return Err(ProvisionError::UserGroup(format!(
            "Failed to set password for {}: {}",
            username,
            output.stderr.trim()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::exec::mock::MockRunner;
    use crate::state::HostPaths;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_user_invocations() {
        let runner = Arc::new(MockRunner::new());
        let ctx = HostContext::with_runner(runner.clone(), HostPaths::with_root("/nonexistent"));
        let step = CreateUser::new("admin", Secret::new("pw"));

        assert!(!step.is_satisfied(&ctx).await.unwrap());
        assert_eq!(step.apply(&ctx).await.unwrap(), StepOutcome::Applied);

        let calls = runner.calls();
        assert_eq!(
            calls[0].line(),
            "useradd --create-home --shell /bin/bash admin"
        );
        assert_eq!(calls[1].program, "chpasswd");
        assert!(calls[1].args.is_empty());
        assert_eq!(calls[1].stdin.as_deref(), Some(&b"admin:pw\n"[..]));
    }

    #[tokio::test]
    async fn test_existing_user_exit_code_tolerated() {
        let runner = MockRunner::new().with_response(
            "useradd",
            &[],
            CommandOutput::failed(9, "useradd: user 'admin' already exists"),
        );
        assert!(create_user(&runner, "admin").await.is_ok());
    }

    #[tokio::test]
    async fn test_chpasswd_failure() {
        let runner =
            MockRunner::new().with_response("chpasswd", &[], CommandOutput::failed(1, "PAM"));
        let err = set_user_password(&runner, "admin", &Secret::new("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UserGroup(_)));
        assert!(!err.to_string().contains("pw"));
    }
}

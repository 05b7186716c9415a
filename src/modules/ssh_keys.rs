//! SSH key module
//!
//! Generates the user's key pair and authorizes its public half for login.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::exec::CommandRunner;
use crate::state::{HostContext, accounts};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// RSA key size for the generated pair
pub const KEY_BITS: &str = "4096";

/// Generates `~/.ssh/id_rsa` for the user unless it exists
pub struct GenerateKeyPair {
    user: String,
}

impl GenerateKeyPair {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

#[async_trait]
impl Step for GenerateKeyPair {
    fn name(&self) -> &'static str {
        "ssh-key-pair"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        let home = accounts::user_home(&ctx.paths, &self.user).await?;
        Ok(ctx.paths.private_key(&home).is_file())
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        let home = accounts::user_home(&ctx.paths, &self.user).await?;
        let ssh_dir = ctx.paths.ssh_dir(&home);
        ensure_ssh_dir(runner, &ssh_dir, &self.user).await?;

        let key_path = ctx.paths.private_key(&home);
        let key_path = key_path.to_string_lossy();
        runner
            .run(
                "sudo",
                &[
                    "-u",
                    self.user.as_str(),
                    "ssh-keygen",
                    "-t",
                    "rsa",
                    "-b",
                    KEY_BITS,
                    "-f",
                    &*key_path,
                    "-N",
                    "",
                ],
            )
            .await?
            .check("ssh-keygen")?;

        info!("SSH key pair generated for {}", self.user);
        Ok(StepOutcome::Applied)
    }
}

/// Appends the generated public key to `authorized_keys`
///
/// Runs every time, so repeated runs add the same key again.
pub struct AuthorizeKey {
    user: String,
}

impl AuthorizeKey {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

#[async_trait]
impl Step for AuthorizeKey {
    fn name(&self) -> &'static str {
        "authorized-keys"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        let home = accounts::user_home(&ctx.paths, &self.user).await?;
        let authorized_keys = ctx.paths.authorized_keys(&home);
        let public_key = ctx.paths.public_key(&home);

        let key = fs::read_to_string(&public_key).await.map_err(|e| {
            ProvisionError::step(
                self.name(),
                format!("cannot read {}: {}", public_key.display(), e),
            )
        })?;

        if authorized_keys.is_file() {
            warn!("authorized_keys already exists, proceeding...");
        } else {
            ensure_ssh_dir(runner, &ctx.paths.ssh_dir(&home), &self.user).await?;
            create_authorized_keys(runner, &authorized_keys, &self.user).await?;
            info!("authorized_keys created");
        }

        append_key(&authorized_keys, &key).await?;
        info!("Public key appended to {}", authorized_keys.display());
        Ok(StepOutcome::Applied)
    }
}

/// Create the .ssh directory with mode 700 owned by the user
async fn ensure_ssh_dir(
    runner: &dyn CommandRunner,
    ssh_dir: &Path,
    username: &str,
) -> Result<(), ProvisionError> {
    if ssh_dir.is_dir() {
        return Ok(());
    }

    debug!("Creating SSH directory: {:?}", ssh_dir);
    fs::create_dir_all(ssh_dir).await?;

    // Set permissions to 700
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(ssh_dir, std::fs::Permissions::from_mode(0o700)).await?;
    }

    change_ownership(runner, ssh_dir, username).await
}

/// Create an empty authorized_keys with mode 600 owned by the user
async fn create_authorized_keys(
    runner: &dyn CommandRunner,
    path: &Path,
    username: &str,
) -> Result<(), ProvisionError> {
    fs::write(path, "").await?;

    // Set permissions to 600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    change_ownership(runner, path, username).await
}

async fn append_key(path: &Path, key: &str) -> Result<(), ProvisionError> {
    let mut file = fs::OpenOptions::new().append(true).open(path).await?;
    file.write_all(key.as_bytes()).await?;
    if !key.ends_with('\n') {
        file.write_all(b"\n").await?;
    }
    file.flush().await?;
    Ok(())
}

async fn change_ownership(
    runner: &dyn CommandRunner,
    path: &Path,
    username: &str,
) -> Result<(), ProvisionError> {
    let owner = format!("{0}:{0}", username);
    let target = path.to_string_lossy();
    let output = runner.run("chown", &[owner.as_str(), &*target]).await?;

    if !output.success() {
        debug!(
            "Failed to change ownership of {:?}: {}",
            path,
            output.stderr.trim()
        );
    }

    Ok(())
}

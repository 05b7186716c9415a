//! Deployment folder module
//!
//! Ensures /opt/<folder> exists, is owned by the user, and is reachable
//! from the user's home through a symlink.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::exec::CommandRunner;
use crate::state::paths::DEPLOY_BASE;
use crate::state::{HostContext, accounts};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

pub struct DeployFolder {
    user: String,
    folder: String,
}

impl DeployFolder {
    pub fn new(user: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl Step for DeployFolder {
    fn name(&self) -> &'static str {
        "deploy-folder"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        let owner = format!("{0}:{0}", self.user);

        let dir = ctx.paths.deploy_dir(&self.folder);
        fs::create_dir_all(&dir).await?;
        info!("Folder {} ready", dir.display());
        chown(runner, &owner, &dir, false).await?;

        let home = accounts::user_home(&ctx.paths, &self.user).await?;
        let home = ctx.paths.resolve(&home);
        if !home.is_dir() {
            warn!("Home {} missing, not linking {}", home.display(), self.folder);
            return Ok(StepOutcome::Applied);
        }

        let link = home.join(&self.folder);
        if fs::symlink_metadata(&link).await.is_ok() {
            warn!("{} already exists, proceeding...", link.display());
        } else {
            let target = Path::new(DEPLOY_BASE).join(&self.folder);
            fs::symlink(&target, &link).await?;
            info!("{} symlinked to {}", target.display(), link.display());
        }
        chown(runner, &owner, &link, true).await?;

        Ok(StepOutcome::Applied)
    }
}

async fn chown(
    runner: &dyn CommandRunner,
    owner: &str,
    path: &Path,
    no_dereference: bool,
) -> Result<(), ProvisionError> {
    let path = path.to_string_lossy();
    let mut args: Vec<&str> = Vec::with_capacity(3);
    if no_dereference {
        args.push("-h");
    }
    args.push(owner);
    args.push(&*path);

    runner.run("chown", &args).await?.check("chown")?;
    Ok(())
}

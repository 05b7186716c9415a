//! Preflight checks: privilege and platform
//!
//! Both are fatal. They only read host state, so they run before the
//! operator is asked to confirm.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::state::HostContext;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Fails unless running with uid 0
pub struct RequireRoot;

#[async_trait]
impl Step for RequireRoot {
    fn name(&self) -> &'static str {
        "privilege-check"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    fn is_fatal(&self) -> bool {
        true
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let output = ctx
            .runner
            .run("id", &["-u"])
            .await
            .and_then(|o| o.check("id"))
            .map_err(|e| ProvisionError::Privilege(format!("cannot determine uid: {}", e)))?;

        let uid = output.stdout.trim();
        debug!("Effective uid: {}", uid);

        if uid != "0" {
            return Err(ProvisionError::Privilege(
                "please run as root".to_string(),
            ));
        }

        Ok(StepOutcome::Applied)
    }
}

/// Fails off Linux; warns on distributions other than Ubuntu
pub struct RequireLinux;

#[async_trait]
impl Step for RequireLinux {
    fn name(&self) -> &'static str {
        "platform-check"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    fn is_fatal(&self) -> bool {
        true
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        if !cfg!(target_os = "linux") {
            return Err(ProvisionError::Platform(
                "this tool only works on Linux".to_string(),
            ));
        }

        let os_release = tokio::fs::read_to_string(ctx.paths.os_release())
            .await
            .unwrap_or_default();

        if !is_ubuntu(&os_release) {
            warn!("Tested on Ubuntu 22.04, other distributions may not work");
        }

        Ok(StepOutcome::Applied)
    }
}

/// Value of `key` in os-release content, unquoted
pub fn os_release_field(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches('"').trim_matches('\'').to_string())
    })
}

/// Ubuntu itself, or a derivative listing it in `ID_LIKE`
pub fn is_ubuntu(os_release: &str) -> bool {
    os_release_field(os_release, "ID").as_deref() == Some("ubuntu")
        || os_release_field(os_release, "ID_LIKE")
            .is_some_and(|like| like.split_whitespace().any(|id| id == "ubuntu"))
}

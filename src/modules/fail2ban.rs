//! Fail2Ban jail module
//!
//! Installs the operator's jail template as jail.local with the SSH port
//! filled in, then restarts the ban daemon.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::config::existing_input;
use crate::state::HostContext;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Token in the jail template replaced by the SSH port
pub const SSH_PORT_PLACEHOLDER: &str = "{{SSH_PORT}}";

/// Substitute every placeholder occurrence with `port`
pub fn render_jail(template: &str, port: u16) -> String {
    template.replace(SSH_PORT_PLACEHOLDER, &port.to_string())
}

pub struct Fail2BanJail {
    template: Option<PathBuf>,
    ssh_port: u16,
}

impl Fail2BanJail {
    pub fn new(template: Option<PathBuf>, ssh_port: u16) -> Self {
        Self { template, ssh_port }
    }
}

#[async_trait]
impl Step for Fail2BanJail {
    fn name(&self) -> &'static str {
        "fail2ban-jail"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let Some(template_path) = existing_input(self.template.as_deref()) else {
            return Ok(StepOutcome::skipped(match &self.template {
                Some(path) => format!("Fail2Ban config {} not found", path.display()),
                None => "no Fail2Ban config supplied".to_string(),
            }));
        };

        let template = fs::read_to_string(template_path).await?;
        let jail = render_jail(&template, self.ssh_port);

        let target = ctx.paths.fail2ban_jail_local();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, jail).await?;
        info!("Fail2Ban jail written to {}", target.display());

        ctx.runner
            .run("systemctl", &["restart", "fail2ban"])
            .await?
            .check("systemctl restart fail2ban")?;
        info!("Fail2Ban restarted");

        Ok(StepOutcome::Applied)
    }
}

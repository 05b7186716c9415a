//! Provisioning run
//!
//! Phases, in order:
//! - Preflight: privilege and platform checks (read-only, fatal)
//! - Confirmation pause (skipped with `--yes`)
//! - Packages: Docker and Fail2Ban
//! - Credentials: masked password, entered twice
//! - Host: account, groups, folder, SSH, ban policy, honeypot, crontab

use crate::ProvisionError;
use crate::config::{DOCKER_GROUP, ProvisionRequest};
use crate::modules::Step;
use crate::modules::cron::InstallCrontab;
use crate::modules::fail2ban::Fail2BanJail;
use crate::modules::folder::DeployFolder;
use crate::modules::groups::{EnsureGroup, EnsureMembership};
use crate::modules::honeypot::Honeypot;
use crate::modules::packages::{InstallDocker, InstallFail2Ban};
use crate::modules::preflight::{RequireLinux, RequireRoot};
use crate::modules::ssh_keys::{AuthorizeKey, GenerateKeyPair};
use crate::modules::sshd::SshdPort;
use crate::modules::users::CreateUser;
use crate::prompt::{Prompter, Secret, collect_password};
use crate::runner::{RunReport, StepRunner};
use crate::state::HostContext;
use crate::template::Guidance;
use tracing::{debug, info};

pub struct Provisioner {
    ctx: HostContext,
    prompter: Box<dyn Prompter>,
    assume_yes: bool,
}

impl Provisioner {
    pub fn new(ctx: HostContext, prompter: Box<dyn Prompter>) -> Self {
        Self {
            ctx,
            prompter,
            assume_yes: false,
        }
    }

    /// Skip the confirmation pause
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Execute every phase against the host
    ///
    /// Returns the per-step outcomes. Only fatal errors (invalid request,
    /// privilege, platform, declined confirmation, password mismatch) are
    /// returned as `Err`; any other step failure is recorded and the run
    /// carries on.
    pub async fn run(&self, request: &ProvisionRequest) -> Result<RunReport, ProvisionError> {
        request.validate()?;
        debug!("Request: {:?}", request);

        let runner = StepRunner::new(&self.ctx);
        let mut report = RunReport::default();

        runner.run_all(&preflight_steps(), &mut report).await?;
        self.confirm(request)?;

        runner.run_all(&package_steps(), &mut report).await?;

        let password = collect_password(self.prompter.as_ref(), &request.user)?;
        runner
            .run_all(&host_steps(request, password), &mut report)
            .await?;

        let failed = report.failures().count();
        info!(
            "Provisioning of {} finished ({} steps, {} failed)",
            request.user,
            report.steps.len(),
            failed
        );
        Ok(report)
    }

    /// Render the operator checklist for a finished run
    pub async fn guidance(
        &self,
        request: &ProvisionRequest,
        report: &RunReport,
    ) -> Result<String, ProvisionError> {
        Guidance::from_run(&self.ctx.paths, request, report)
            .await?
            .render()
    }

    fn confirm(&self, request: &ProvisionRequest) -> Result<(), ProvisionError> {
        if self.assume_yes {
            debug!("Confirmation skipped");
            return Ok(());
        }

        println!("{}", summary(request));
        if self.prompter.confirm("Proceed with provisioning?")? {
            Ok(())
        } else {
            Err(ProvisionError::Aborted)
        }
    }
}

/// Human-readable plan shown before the confirmation pause
pub fn summary(request: &ProvisionRequest) -> String {
    let optional = |p: &Option<std::path::PathBuf>| match p {
        Some(p) => p.display().to_string(),
        None => "(none)".to_string(),
    };

    format!(
        "About to provision this host:\n  \
         user:            {}\n  \
         folder:          /opt/{}\n  \
         ssh port:        {}\n  \
         honeypot port:   {}\n  \
         fail2ban config: {}\n  \
         honeypot config: {}\n  \
         honeypot db:     {}\n  \
         cron file:       {}",
        request.user,
        request.folder,
        request.ssh_port,
        request.honeypot_port,
        optional(&request.fail2ban_config),
        optional(&request.honeypot_config),
        optional(&request.honeypot_db),
        optional(&request.cron_file),
    )
}

fn preflight_steps() -> Vec<Box<dyn Step>> {
    vec![Box::new(RequireRoot), Box::new(RequireLinux)]
}

fn package_steps() -> Vec<Box<dyn Step>> {
    vec![Box::new(InstallDocker), Box::new(InstallFail2Ban)]
}

fn host_steps(request: &ProvisionRequest, password: Secret) -> Vec<Box<dyn Step>> {
    let user = request.user.as_str();
    vec![
        Box::new(CreateUser::new(user, password)),
        Box::new(EnsureGroup::new(DOCKER_GROUP)),
        Box::new(EnsureMembership::new(user, DOCKER_GROUP)),
        Box::new(DeployFolder::new(user, request.folder.as_str())),
        Box::new(GenerateKeyPair::new(user)),
        Box::new(AuthorizeKey::new(user)),
        Box::new(SshdPort::new(request.ssh_port)),
        Box::new(Fail2BanJail::new(
            request.fail2ban_config.clone(),
            request.ssh_port,
        )),
        Box::new(Honeypot::new(
            request.honeypot_config.clone(),
            request.honeypot_db.clone(),
            request.honeypot_port,
        )),
        Box::new(InstallCrontab::new(user, request.cron_file.clone())),
    ]
}

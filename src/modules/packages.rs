//! Package installation module
//!
//! Installs Docker and Fail2Ban using the host's package manager (apt, dnf,
//! yum, zypper, apk). On apt hosts Docker comes from the vendor repository,
//! whose signing key and source list are registered first.

use super::{Step, StepOutcome};
use crate::ProvisionError;
use crate::exec::{CommandRunner, command_exists};
use crate::modules::preflight::os_release_field;
use crate::state::HostContext;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

/// Packages making up Docker Engine in the vendor apt repository
pub const DOCKER_CE_PACKAGES: &[&str] = &[
    "docker-ce",
    "docker-ce-cli",
    "containerd.io",
    "docker-buildx-plugin",
    "docker-compose-plugin",
];

/// Detected package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Apk,
}

impl PackageManager {
    /// Detect the system's package manager
    pub async fn detect(runner: &dyn CommandRunner) -> Option<Self> {
        // Check in order of preference
        for (cmd, pm) in [
            ("apt-get", Self::Apt),
            ("dnf", Self::Dnf),
            ("yum", Self::Yum),
            ("zypper", Self::Zypper),
            ("apk", Self::Apk),
        ] {
            if command_exists(runner, cmd).await {
                return Some(pm);
            }
        }
        None
    }

    fn install_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Self::Apt => ("apt-get", vec!["install", "-y"]),
            Self::Dnf => ("dnf", vec!["install", "-y"]),
            Self::Yum => ("yum", vec!["install", "-y"]),
            Self::Zypper => ("zypper", vec!["--non-interactive", "install"]),
            Self::Apk => ("apk", vec!["add", "--no-cache"]),
        }
    }

    fn update_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Self::Apt => ("apt-get", vec!["update"]),
            Self::Dnf => ("dnf", vec!["check-update"]),
            Self::Yum => ("yum", vec!["check-update"]),
            Self::Zypper => ("zypper", vec!["--non-interactive", "refresh"]),
            Self::Apk => ("apk", vec!["update"]),
        }
    }

    /// Distribution package providing the Docker engine
    fn docker_package(&self) -> &'static str {
        match self {
            Self::Apt => "docker.io",
            Self::Dnf | Self::Yum | Self::Zypper | Self::Apk => "docker",
        }
    }
}

async fn detect_or_fail(runner: &dyn CommandRunner) -> Result<PackageManager, ProvisionError> {
    PackageManager::detect(runner)
        .await
        .ok_or_else(|| ProvisionError::step("packages", "No supported package manager found"))
}

/// Update package cache
pub async fn update_package_cache(
    runner: &dyn CommandRunner,
    pm: PackageManager,
) -> Result<(), ProvisionError> {
    info!("Updating package cache using {:?}", pm);

    let (cmd, args) = pm.update_command();
    let output = runner.run(cmd, &args).await?;

    // Note: yum/dnf check-update returns 100 if updates available, which is not an error
    if !output.success() && output.code != Some(100) {
        warn!("Package cache update had issues: {}", output.stderr.trim());
    }

    Ok(())
}

/// Install packages
pub async fn install_packages(
    runner: &dyn CommandRunner,
    pm: PackageManager,
    packages: &[&str],
) -> Result<(), ProvisionError> {
    if packages.is_empty() {
        return Ok(());
    }

    info!("Installing {} packages using {:?}", packages.len(), pm);
    debug!("Packages: {:?}", packages);

    let (cmd, base_args) = pm.install_command();
    let mut args: Vec<&str> = base_args;
    args.extend_from_slice(packages);

    let output = runner.run(cmd, &args).await?;
    if !output.success() {
        return Err(ProvisionError::step(
            "packages",
            format!("Failed to install packages: {}", output.stderr.trim()),
        ));
    }

    info!("Successfully installed {} packages", packages.len());
    Ok(())
}

/// Register Docker's apt signing key and repository if absent
pub async fn ensure_docker_apt_repository(ctx: &HostContext) -> Result<(), ProvisionError> {
    let keyring = ctx.paths.docker_keyring();
    if keyring.exists() {
        debug!("Docker signing key already present: {}", keyring.display());
    } else {
        let url = format!("{}/gpg", ctx.docker_repo.trim_end_matches('/'));
        info!("Fetching Docker signing key from {}", url);

        let key = ctx
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = keyring.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&keyring, &key).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&keyring, std::fs::Permissions::from_mode(0o644)).await?;
        }
    }

    let source = ctx.paths.docker_apt_source();
    if source.exists() {
        debug!("Docker apt source already present: {}", source.display());
        return Ok(());
    }

    let arch = ctx
        .runner
        .run("dpkg", &["--print-architecture"])
        .await?
        .check("dpkg")?
        .stdout
        .trim()
        .to_string();

    let os_release = fs::read_to_string(ctx.paths.os_release()).await?;
    let codename = os_release_field(&os_release, "VERSION_CODENAME")
        .or_else(|| os_release_field(&os_release, "UBUNTU_CODENAME"))
        .ok_or_else(|| ProvisionError::step("docker", "VERSION_CODENAME missing from os-release"))?;

    // signed-by must name the key's real location, not the test root
    let line = docker_source_line(&arch, "/etc/apt/keyrings/docker.asc", &ctx.docker_repo, &codename);

    if let Some(parent) = source.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&source, line).await?;
    info!("Registered Docker apt repository for {} ({})", codename, arch);

    Ok(())
}

/// apt source line for the Docker repository
pub fn docker_source_line(arch: &str, keyring: &str, repo: &str, codename: &str) -> String {
    format!(
        "deb [arch={} signed-by={}] {} {} stable\n",
        arch,
        keyring,
        repo.trim_end_matches('/'),
        codename
    )
}

/// Installs Docker Engine unless `docker` is already on the path
pub struct InstallDocker;

#[async_trait]
impl Step for InstallDocker {
    fn name(&self) -> &'static str {
        "install-docker"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        Ok(command_exists(ctx.runner.as_ref(), "docker").await)
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        let pm = detect_or_fail(runner).await?;

        if pm == PackageManager::Apt {
            install_packages(runner, pm, &["ca-certificates"]).await?;
            ensure_docker_apt_repository(ctx).await?;
            update_package_cache(runner, pm).await?;
            install_packages(runner, pm, DOCKER_CE_PACKAGES).await?;
        } else {
            update_package_cache(runner, pm).await?;
            install_packages(runner, pm, &[pm.docker_package()]).await?;
        }

        Ok(StepOutcome::Applied)
    }
}

/// Installs Fail2Ban unless `fail2ban-client` is already on the path
pub struct InstallFail2Ban;

#[async_trait]
impl Step for InstallFail2Ban {
    fn name(&self) -> &'static str {
        "install-fail2ban"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        Ok(command_exists(ctx.runner.as_ref(), "fail2ban-client").await)
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let runner = ctx.runner.as_ref();
        let pm = detect_or_fail(runner).await?;

        update_package_cache(runner, pm).await?;
        install_packages(runner, pm, &["fail2ban"]).await?;

        Ok(StepOutcome::Applied)
    }
}

//! Provisioning request
//!
//! The single immutable configuration value handed to every step.

use crate::ProvisionError;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Group granting access to the Docker daemon
pub const DOCKER_GROUP: &str = "docker";

/// Login shell for the administrative user
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Default external port for the honeypot (real SSH moves away from it)
pub const DEFAULT_HONEYPOT_PORT: u16 = 22;

/// Range used when no SSH port is requested
pub const RANDOM_SSH_PORT_RANGE: std::ops::RangeInclusive<u16> = 1024..=10000;

/// Maximum user name length accepted by `useradd`
const MAX_USER_LEN: usize = 32;

/// Everything a provisioning run needs to know
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionRequest {
    /// Administrative user to create
    pub user: String,
    /// Folder created under /opt
    pub folder: String,
    /// Port the SSH daemon is moved to
    pub ssh_port: u16,
    /// External port published by the honeypot
    pub honeypot_port: u16,
    /// Fail2Ban jail template
    pub fail2ban_config: Option<PathBuf>,
    /// Cowrie configuration file
    pub honeypot_config: Option<PathBuf>,
    /// Cowrie credential database
    pub honeypot_db: Option<PathBuf>,
    /// Crontab installed for the user
    pub cron_file: Option<PathBuf>,
    /// Verbose diagnostics
    pub debug: bool,
}

impl ProvisionRequest {
    /// Request with defaults for everything except user and folder
    pub fn new(user: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            folder: folder.into(),
            ssh_port: random_ssh_port(),
            honeypot_port: DEFAULT_HONEYPOT_PORT,
            fail2ban_config: None,
            honeypot_config: None,
            honeypot_db: None,
            cron_file: None,
            debug: false,
        }
    }

    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    pub fn with_honeypot_port(mut self, port: u16) -> Self {
        self.honeypot_port = port;
        self
    }

    pub fn with_fail2ban_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail2ban_config = Some(path.into());
        self
    }

    pub fn with_honeypot(mut self, config: impl Into<PathBuf>, db: impl Into<PathBuf>) -> Self {
        self.honeypot_config = Some(config.into());
        self.honeypot_db = Some(db.into());
        self
    }

    pub fn with_cron_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cron_file = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check the request invariants
    pub fn validate(&self) -> Result<(), ProvisionError> {
        validate_user(&self.user)?;
        validate_folder(&self.folder)?;

        if self.ssh_port == 0 || self.honeypot_port == 0 {
            return Err(ProvisionError::InvalidRequest(
                "ports must be non-zero".to_string(),
            ));
        }

        if self.ssh_port == self.honeypot_port {
            return Err(ProvisionError::InvalidRequest(format!(
                "SSH port and honeypot port are both {}",
                self.ssh_port
            )));
        }

        Ok(())
    }
}

/// Pick a random unprivileged SSH port
pub fn random_ssh_port() -> u16 {
    rand::thread_rng().gen_range(RANDOM_SSH_PORT_RANGE)
}

fn validate_user(user: &str) -> Result<(), ProvisionError> {
    if user.is_empty() {
        return Err(ProvisionError::InvalidRequest(
            "user must not be empty".to_string(),
        ));
    }

    let mut chars = user.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !first_ok || !rest_ok || user.len() > MAX_USER_LEN {
        return Err(ProvisionError::InvalidRequest(format!(
            "invalid user name '{}'",
            user
        )));
    }

    Ok(())
}

fn validate_folder(folder: &str) -> Result<(), ProvisionError> {
    if folder.is_empty() {
        return Err(ProvisionError::InvalidRequest(
            "folder must not be empty".to_string(),
        ));
    }

    if folder == "." || folder == ".." || folder.contains('/') || folder.contains('\0') {
        return Err(ProvisionError::InvalidRequest(format!(
            "folder '{}' must be a single directory name",
            folder
        )));
    }

    Ok(())
}

/// Return `path` if it was supplied and exists on disk
pub fn existing_input(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| p.is_file())
}

//! Host state access
//!
//! The provisioner keeps no state of its own: the host (accounts, files,
//! containers) is the state. [`HostContext`] bundles the handles every step
//! uses to inspect and change it.

pub mod accounts;
pub mod paths;

pub use paths::HostPaths;

use crate::exec::{CommandRunner, TokioCommandRunner};
use std::sync::Arc;

/// Docker's apt repository for Ubuntu
pub const DOCKER_APT_REPO: &str = "https://download.docker.com/linux/ubuntu";

/// Handles shared by all steps
#[derive(Clone)]
pub struct HostContext {
    /// External command execution
    pub runner: Arc<dyn CommandRunner>,
    /// Host file locations
    pub paths: HostPaths,
    /// HTTP client for vendor signing keys
    pub http: reqwest::Client,
    /// Base URL of the Docker apt repository (signing key at `<base>/gpg`)
    pub docker_repo: String,
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext {
    /// Context for the real host
    pub fn new() -> Self {
        Self::with_runner(Arc::new(TokioCommandRunner::new()), HostPaths::new())
    }

    /// Context with a custom runner and paths (useful for testing)
    pub fn with_runner(runner: Arc<dyn CommandRunner>, paths: HostPaths) -> Self {
        Self {
            runner,
            paths,
            http: reqwest::Client::new(),
            docker_repo: DOCKER_APT_REPO.to_string(),
        }
    }

    /// Override the Docker repository base URL
    pub fn with_docker_repo(mut self, url: impl Into<String>) -> Self {
        self.docker_repo = url.into();
        self
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("paths", &self.paths)
            .field("docker_repo", &self.docker_repo)
            .finish_non_exhaustive()
    }
}

//! Cowrie honeypot module
//!
//! Recreates the honeypot container on every run: any container under the
//! reserved name is removed first, so at most one ever exists.

use super::{Frequency, Step, StepOutcome};
use crate::ProvisionError;
use crate::config::existing_input;
use crate::state::HostContext;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reserved container name
pub const CONTAINER_NAME: &str = "cowrie";

/// Honeypot image
pub const IMAGE: &str = "cowrie/cowrie:latest";

/// Port Cowrie's SSH listener binds inside the container
pub const INTERNAL_PORT: u16 = 2222;

const CONFIG_MOUNT: &str = "/cowrie/cowrie-git/etc/cowrie.cfg";
const USERDB_MOUNT: &str = "/cowrie/cowrie-git/etc/userdb.txt";

pub struct Honeypot {
    config: Option<PathBuf>,
    userdb: Option<PathBuf>,
    port: u16,
}

impl Honeypot {
    pub fn new(config: Option<PathBuf>, userdb: Option<PathBuf>, port: u16) -> Self {
        Self {
            config,
            userdb,
            port,
        }
    }
}

/// Arguments for `docker run`
pub fn run_args(config: &Path, userdb: &Path, port: u16) -> Vec<String> {
    vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        CONTAINER_NAME.to_string(),
        "--restart".to_string(),
        "unless-stopped".to_string(),
        "--publish".to_string(),
        format!("{}:{}", port, INTERNAL_PORT),
        "--volume".to_string(),
        format!("{}:{}:ro", config.display(), CONFIG_MOUNT),
        "--volume".to_string(),
        format!("{}:{}:ro", userdb.display(), USERDB_MOUNT),
        IMAGE.to_string(),
    ]
}

fn missing(label: &str, path: &Option<PathBuf>) -> Option<String> {
    match path {
        None => Some(format!("no honeypot {} supplied", label)),
        Some(p) if !p.is_file() => Some(format!("honeypot {} {} not found", label, p.display())),
        Some(_) => None,
    }
}

#[async_trait]
impl Step for Honeypot {
    fn name(&self) -> &'static str {
        "honeypot"
    }

    fn frequency(&self) -> Frequency {
        Frequency::Always
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let (Some(config), Some(userdb)) = (
            existing_input(self.config.as_deref()),
            existing_input(self.userdb.as_deref()),
        ) else {
            let reason = missing("config", &self.config)
                .or_else(|| missing("database", &self.userdb))
                .unwrap_or_default();
            return Ok(StepOutcome::skipped(reason));
        };

        // bind mounts need absolute host paths
        let config = tokio::fs::canonicalize(config).await?;
        let userdb = tokio::fs::canonicalize(userdb).await?;

        let removed = ctx
            .runner
            .run("docker", &["rm", "--force", CONTAINER_NAME])
            .await?;
        if removed.success() {
            debug!("Removed existing {} container", CONTAINER_NAME);
        } else {
            debug!("No {} container to remove: {}", CONTAINER_NAME, removed.stderr.trim());
        }

        let args = run_args(&config, &userdb, self.port);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = ctx.runner.run("docker", &args).await?.check("docker run")?;

        info!(
            "Honeypot {} started on port {} ({})",
            CONTAINER_NAME,
            self.port,
            output.stdout.trim()
        );
        Ok(StepOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::exec::mock::MockRunner;
    use crate::state::HostPaths;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_run_args() {
        let args = run_args(Path::new("/srv/cowrie.cfg"), Path::new("/srv/userdb.txt"), 22);
        assert_eq!(args[0], "run");
        assert!(args.windows(2).any(|w| w == ["--name", "cowrie"]));
        assert!(args.windows(2).any(|w| w == ["--publish", "22:2222"]));
        assert!(args.contains(&"/srv/cowrie.cfg:/cowrie/cowrie-git/etc/cowrie.cfg:ro".to_string()));
        assert!(args.contains(&"/srv/userdb.txt:/cowrie/cowrie-git/etc/userdb.txt:ro".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(IMAGE));
    }

    fn inputs(tmp: &TempDir) -> (PathBuf, PathBuf) {
        let config = tmp.path().join("cowrie.cfg");
        let db = tmp.path().join("cowrie.db");
        std::fs::write(&config, "[honeypot]\nhostname = srv04\n").unwrap();
        std::fs::write(&db, "root:x:!root\n").unwrap();
        (config, db)
    }

    #[tokio::test]
    async fn test_removes_before_starting() {
        let tmp = TempDir::new().unwrap();
        let (config, db) = inputs(&tmp);
        let runner = Arc::new(MockRunner::new().with_response(
            "docker",
            &["rm"],
            CommandOutput::failed(1, "Error: No such container: cowrie"),
        ));
        let ctx = HostContext::with_runner(runner.clone(), HostPaths::with_root(tmp.path()));

        let outcome = Honeypot::new(Some(config), Some(db), 22)
            .apply(&ctx)
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Applied);
        let calls = runner.calls_to("docker", &[]);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].matches("docker", &["rm", "--force", "cowrie"]));
        assert!(calls[1].matches("docker", &["run", "--detach", "--name", "cowrie"]));
    }

    #[tokio::test]
    async fn test_requires_both_files() {
        let tmp = TempDir::new().unwrap();
        let (config, _db) = inputs(&tmp);
        let runner = Arc::new(MockRunner::new());
        let ctx = HostContext::with_runner(runner.clone(), HostPaths::with_root(tmp.path()));

        let outcome = Honeypot::new(Some(config), None, 22).apply(&ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::skipped("no honeypot database supplied"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_docker_run_failure_is_error() {
        let tmp = TempDir::new().unwrap();
        let (config, db) = inputs(&tmp);
        let runner = Arc::new(MockRunner::new().with_response(
            "docker",
            &["run"],
            CommandOutput::failed(125, "port is already allocated"),
        ));
        let ctx = HostContext::with_runner(runner, HostPaths::with_root(tmp.path()));

        let err = Honeypot::new(Some(config), Some(db), 22)
            .apply(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("port is already allocated"));
    }
}

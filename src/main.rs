//! provision - one-shot host bootstrap
//!
//! Installs Docker and Fail2Ban, creates the admin user, moves SSH to a new
//! port, starts the Cowrie honeypot and installs the user's crontab.

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use host_provision::config::{DEFAULT_HONEYPOT_PORT, random_ssh_port};
use host_provision::prompt::TerminalPrompter;
use host_provision::state::HostContext;
use host_provision::{ProvisionRequest, Provisioner, RunReport};

#[derive(Parser, Debug)]
#[command(name = "provision")]
#[command(author, version, about = "Bootstrap a fresh server with hardened SSH and a honeypot", long_about = None)]
struct Cli {
    /// Administrative user to create
    #[arg(long, env = "PROVISION_USER")]
    user: String,

    /// Folder created under /opt and linked from the user's home
    #[arg(long, env = "PROVISION_FOLDER")]
    folder: String,

    /// Fail2Ban jail template ({{SSH_PORT}} is substituted)
    #[arg(long, env = "PROVISION_FAIL2BAN_CONFIG")]
    fail2ban_config: Option<PathBuf>,

    /// Cowrie configuration file
    #[arg(long, env = "PROVISION_HONEYPOT_CONFIG")]
    honeypot_config: Option<PathBuf>,

    /// Cowrie credential database
    #[arg(long, env = "PROVISION_HONEYPOT_DB")]
    honeypot_db: Option<PathBuf>,

    /// External port published by the honeypot
    #[arg(long, env = "PROVISION_HONEYPOT_PORT", default_value_t = DEFAULT_HONEYPOT_PORT)]
    honeypot_port: u16,

    /// Port the SSH daemon moves to (random in 1024-10000 if omitted)
    #[arg(long, env = "PROVISION_SSH_PORT")]
    ssh_port: Option<u16>,

    /// Crontab installed for the user
    #[arg(long, env = "PROVISION_CRON_FILE")]
    cron_file: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(
        long,
        env = "PROVISION_DEBUG",
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    debug: bool,

    /// Do not ask for confirmation before changing the host
    #[arg(short = 'y', long, env = "PROVISION_YES")]
    yes: bool,

    /// Write the per-step outcomes as JSON to this path
    #[arg(long, env = "PROVISION_REPORT")]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn request(&self) -> ProvisionRequest {
        let mut request = ProvisionRequest::new(&self.user, &self.folder)
            .with_ssh_port(self.ssh_port.unwrap_or_else(random_ssh_port))
            .with_honeypot_port(self.honeypot_port)
            .with_debug(self.debug);
        request.fail2ban_config = self.fail2ban_config.clone();
        request.honeypot_config = self.honeypot_config.clone();
        request.honeypot_db = self.honeypot_db.clone();
        request.cron_file = self.cron_file.clone();
        request
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    report
        .write_json(path)
        .await
        .with_context(|| format!("writing run report to {}", path.display()))
}

/// Run the provisioner and map the result to a process exit status
///
/// Fatal errors give 1. Runs that completed, even with failed steps, give 0.
async fn provision(
    provisioner: &Provisioner,
    request: &ProvisionRequest,
    report_path: Option<&Path>,
) -> u8 {
    let report = match provisioner.run(request).await {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    if let Some(path) = report_path {
        if let Err(e) = write_report(&report, path).await {
            warn!("{:#}", e);
        }
    }

    match provisioner.guidance(request, &report).await {
        Ok(text) => println!("{}", text),
        Err(e) => warn!("Could not render guidance: {}", e),
    }

    0
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    let request = cli.request();
    let verbosity = if request.debug {
        cli.verbose.max(1)
    } else {
        cli.verbose
    };
    init_logging(verbosity);

    let provisioner =
        Provisioner::new(HostContext::new(), Box::new(TerminalPrompter)).assume_yes(cli.yes);

    ExitCode::from(provision(&provisioner, &request, cli.report.as_deref()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_provision::exec::CommandOutput;
    use host_provision::exec::mock::MockRunner;
    use host_provision::prompt::ScriptedPrompter;
    use host_provision::state::HostPaths;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_required_flags() {
        assert!(Cli::try_parse_from(["provision", "--user", "admin"]).is_err());
        let cli = Cli::try_parse_from(["provision", "--user", "admin", "--folder", "app"]).unwrap();
        assert_eq!(cli.honeypot_port, 22);
        assert!(!cli.debug);
        assert!(!cli.yes);
    }

    #[test]
    fn test_debug_with_and_without_value() {
        let cli =
            Cli::try_parse_from(["provision", "--user", "a", "--folder", "b", "--debug"]).unwrap();
        assert!(cli.debug);
        let cli = Cli::try_parse_from([
            "provision", "--user", "a", "--folder", "b", "--debug", "false",
        ])
        .unwrap();
        assert!(!cli.debug);
    }

    #[test]
    fn test_debug_carried_into_request() {
        let cli =
            Cli::try_parse_from(["provision", "--user", "a", "--folder", "b", "--debug"]).unwrap();
        assert!(cli.request().debug);
        let cli = Cli::try_parse_from(["provision", "--user", "a", "--folder", "b"]).unwrap();
        assert!(!cli.request().debug);
    }

    #[test]
    fn test_request_from_flags() {
        let cli = Cli::try_parse_from([
            "provision",
            "--user",
            "admin",
            "--folder",
            "app",
            "--ssh-port",
            "4022",
            "--cron-file",
            "/srv/jobs.cron",
        ])
        .unwrap();
        let request = cli.request();
        assert_eq!(request.ssh_port, 4022);
        assert_eq!(request.cron_file, Some(PathBuf::from("/srv/jobs.cron")));
        assert_eq!(request.honeypot_config, None);
    }

    #[test]
    fn test_random_port_in_range() {
        let cli = Cli::try_parse_from(["provision", "--user", "a", "--folder", "b"]).unwrap();
        let port = cli.request().ssh_port;
        assert!((1024..=10000).contains(&port));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = Cli::try_parse_from(["provision", "--user", "a", "--folder", "b", "--nope"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    fn provisioner(root: &Path, runner: MockRunner, prompter: ScriptedPrompter) -> Provisioner {
        let ctx = HostContext::with_runner(Arc::new(runner), HostPaths::with_root(root));
        Provisioner::new(ctx, Box::new(prompter)).assume_yes(true)
    }

    #[tokio::test]
    async fn test_fatal_errors_exit_1() {
        let tmp = TempDir::new().unwrap();
        let request = ProvisionRequest::new("admin", "app").with_ssh_port(4022);

        let non_root = MockRunner::new().with_response("id", &["-u"], CommandOutput::ok("1000\n"));
        let p = provisioner(tmp.path(), non_root, ScriptedPrompter::new(&["pw", "pw"]));
        assert_eq!(provision(&p, &request, None).await, 1);

        let p = provisioner(
            tmp.path(),
            MockRunner::new().as_root(),
            ScriptedPrompter::new(&["pw", "wp"]),
        );
        assert_eq!(provision(&p, &request, None).await, 1);

        let clash = ProvisionRequest::new("admin", "app").with_ssh_port(22);
        let p = provisioner(tmp.path(), MockRunner::new().as_root(), ScriptedPrompter::new(&[]));
        assert_eq!(provision(&p, &clash, None).await, 1);
    }

    #[tokio::test]
    async fn test_failed_steps_still_exit_0() {
        let tmp = TempDir::new().unwrap();
        let request = ProvisionRequest::new("admin", "app").with_ssh_port(4022);
        let p = provisioner(
            tmp.path(),
            MockRunner::new().as_root(),
            ScriptedPrompter::new(&["pw", "pw"]),
        );
        let report = tmp.path().join("report.json");

        // no sshd_config and no public key in the tree: those steps fail
        assert_eq!(provision(&p, &request, Some(&report)).await, 0);

        let json = std::fs::read_to_string(&report).unwrap();
        assert!(json.contains("\"status\": \"failed\""));
    }
}

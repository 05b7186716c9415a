//! SSH daemon port module
//!
//! Rewrites the `Port` directive in sshd_config and restarts the daemon.
//! The first commented default (`#Port 22`) or active directive is edited and
//! any other active directive is commented out. A file matching neither is
//! left untouched.

use super::{Step, StepOutcome};
use crate::ProvisionError;
use crate::state::HostContext;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

/// Port sshd listens on when unconfigured
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Service names tried, in order, when restarting the daemon
const SSH_SERVICES: &[&str] = &["ssh", "sshd"];

/// Result of rewriting an sshd_config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRewrite {
    /// `#Port 22` was the first match and became an active directive
    Activated { contents: String },
    /// The first match was an active directive; its number was replaced
    Replaced { previous: u16, contents: String },
    /// The only active directive already names the requested port
    Unchanged,
    /// Neither a commented default nor an active numeric directive exists
    NoMatch,
}

/// Keyword and value of a `Port` line, ignoring case of the keyword
fn port_directive(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    let keyword = parts.next()?;
    let value = parts.next()?;
    if !keyword.eq_ignore_ascii_case("port") || parts.next().is_some_and(|p| !p.starts_with('#')) {
        return None;
    }
    Some(value)
}

/// Whether `line` is the commented default `#Port 22`
fn is_commented_default(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('#')
        .and_then(port_directive)
        .is_some_and(|v| v.parse::<u16>().ok() == Some(DEFAULT_SSH_PORT))
}

/// Numeric value of an active `Port <n>` line
fn active_port(line: &str) -> Option<u16> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    port_directive(trimmed)?.parse().ok()
}

/// Rebuild `contents`, replacing line `i` with `edit(i, line)` when it returns `Some`
fn rewrite_lines(contents: &str, mut edit: impl FnMut(usize, &str) -> Option<String>) -> String {
    let mut out = String::with_capacity(contents.len() + 16);
    for (i, line) in contents.split_inclusive('\n').enumerate() {
        let body = line.strip_suffix('\n').unwrap_or(line);
        match edit(i, body) {
            Some(replacement) => {
                out.push_str(&replacement);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Compute the new sshd_config for `port`
///
/// The first line that is either the commented default or an active numeric
/// directive becomes `Port <port>`. Any other active directive is commented
/// out, so exactly one remains.
pub fn rewrite_port(contents: &str, port: u16) -> PortRewrite {
    let lines: Vec<&str> = contents.lines().collect();
    let active: Vec<(usize, u16)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| active_port(l).map(|p| (i, p)))
        .collect();

    if matches!(active.as_slice(), [(_, current)] if *current == port) {
        return PortRewrite::Unchanged;
    }

    let Some(target) = lines
        .iter()
        .position(|l| is_commented_default(l) || active_port(l).is_some())
    else {
        return PortRewrite::NoMatch;
    };

    let directive = format!("Port {}", port);
    let rewritten = rewrite_lines(contents, |i, line| {
        if i == target {
            Some(directive.clone())
        } else if active.iter().any(|(a, _)| *a == i) {
            Some(format!("#{}", line))
        } else {
            None
        }
    });

    match active.iter().find(|(a, _)| *a == target) {
        Some(&(_, previous)) => PortRewrite::Replaced {
            previous,
            contents: rewritten,
        },
        None => PortRewrite::Activated {
            contents: rewritten,
        },
    }
}

/// Moves sshd to the requested port
pub struct SshdPort {
    port: u16,
}

impl SshdPort {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    async fn restart(&self, ctx: &HostContext) -> Result<(), ProvisionError> {
        let mut last_error = String::new();
        for &service in SSH_SERVICES {
            let output = ctx.runner.run("systemctl", &["restart", service]).await?;
            if output.success() {
                info!("SSH server restarted ({})", service);
                return Ok(());
            }
            debug!("systemctl restart {} failed: {}", service, output.stderr.trim());
            last_error = output.stderr.trim().to_string();
        }
        Err(ProvisionError::step(
            self.name(),
            format!("could not restart the SSH daemon: {}", last_error),
        ))
    }
}

#[async_trait]
impl Step for SshdPort {
    fn name(&self) -> &'static str {
        "sshd-port"
    }

    async fn is_satisfied(&self, ctx: &HostContext) -> Result<bool, ProvisionError> {
        let path = ctx.paths.sshd_config();
        if !path.is_file() {
            return Ok(false);
        }
        let contents = fs::read_to_string(&path).await?;
        Ok(rewrite_port(&contents, self.port) == PortRewrite::Unchanged)
    }

    async fn apply(&self, ctx: &HostContext) -> Result<StepOutcome, ProvisionError> {
        let path = ctx.paths.sshd_config();
        let contents = fs::read_to_string(&path).await.map_err(|e| {
            ProvisionError::step(
                self.name(),
                format!("SSH config file not found: {} ({})", path.display(), e),
            )
        })?;

        let updated = match rewrite_port(&contents, self.port) {
            PortRewrite::Activated { contents } => contents,
            PortRewrite::Replaced { previous, contents } => {
                debug!("Replacing active port {}", previous);
                contents
            }
            PortRewrite::Unchanged => return Ok(StepOutcome::AlreadySatisfied),
            PortRewrite::NoMatch => {
                warn!("No port directive in {}, leaving it untouched", path.display());
                return Ok(StepOutcome::skipped("no matching port directive"));
            }
        };

        fs::write(&path, updated).await?;
        info!("SSH server port changed to {}", self.port);

        self.restart(ctx).await?;
        Ok(StepOutcome::Applied)
    }
}

//! External command execution
//!
//! Every host mutation that is not a plain file edit goes through a
//! [`CommandRunner`], so steps can be exercised against [`mock::MockRunner`].

pub mod mock;

use crate::ProvisionError;
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

/// Captured result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a command error naming the program
    pub fn check(self, program: &str) -> Result<Self, ProvisionError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProvisionError::Command(format!(
                "{} exited with status {}: {}",
                program,
                self.code.unwrap_or(-1),
                self.stderr.trim()
            )))
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Abstracts process execution so steps can be tested without a host
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError>;

    /// Run a program with `input` written to its stdin
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<CommandOutput, ProvisionError>;
}

/// Production runner backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError> {
        debug!("Running: {} {:?}", program, args);

        let output = tokio::process::Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProvisionError::Command(format!("failed to spawn {}: {}", program, e)))?;

        Ok(output.into())
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<CommandOutput, ProvisionError> {
        // stdin may carry a password, never log it
        debug!("Running with stdin: {} {:?}", program, args);

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProvisionError::Command(format!("failed to spawn {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(input)
                .await
                .map_err(|e| ProvisionError::Command(e.to_string()))?;
            // dropping stdin closes the pipe so the child sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProvisionError::Command(e.to_string()))?;

        Ok(output.into())
    }
}

/// Check if a command resolves on the path
pub async fn command_exists(runner: &dyn CommandRunner, cmd: &str) -> bool {
    runner
        .run("which", &[cmd])
        .await
        .is_ok_and(|o| o.success())
}

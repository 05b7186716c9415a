//! Mock command runner for testing
//!
//! Records every invocation and answers from a list of scripted responses.
//! Unscripted commands succeed with empty output.

use super::{CommandOutput, CommandRunner};
use crate::ProvisionError;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// A recorded command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    /// Whether this invocation is `program` with arguments starting with `args`
    pub fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.program == program
            && self.args.len() >= args.len()
            && self.args.iter().zip(args).all(|(a, b)| a == b)
    }

    /// Render as a shell-like line, handy in assertion messages
    pub fn line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

struct Response {
    program: String,
    args: Vec<String>,
    output: CommandOutput,
}

/// Mock runner
///
/// # Example
/// ```
/// use host_provision::exec::CommandOutput;
/// use host_provision::exec::mock::MockRunner;
///
/// let runner = MockRunner::new()
///     .with_response("id", &["-u"], CommandOutput::ok("0\n"))
///     .with_response("which", &["docker"], CommandOutput::failed(1, ""));
/// ```
#[derive(Default)]
pub struct MockRunner {
    responses: Vec<Response>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program` invoked with arguments starting with `args`.
    /// Earlier responses take precedence over later ones.
    pub fn with_response(mut self, program: &str, args: &[&str], output: CommandOutput) -> Self {
        self.responses.push(Response {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output,
        });
        self
    }

    /// Answer `id -u` as the root user
    pub fn as_root(self) -> Self {
        self.with_response("id", &["-u"], CommandOutput::ok("0\n"))
    }

    /// All invocations so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().clone()
    }

    /// Invocations matching `program` and leading `args`
    pub fn calls_to(&self, program: &str, args: &[&str]) -> Vec<Invocation> {
        self.lock()
            .iter()
            .filter(|c| c.matches(program, args))
            .cloned()
            .collect()
    }

    /// Whether any invocation matched `program` and leading `args`
    pub fn was_called(&self, program: &str, args: &[&str]) -> bool {
        self.lock().iter().any(|c| c.matches(program, args))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Invocation>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn respond(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> CommandOutput {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdin: stdin.map(<[u8]>::to_vec),
        };

        let output = self
            .responses
            .iter()
            .find(|r| {
                let wanted: Vec<&str> = r.args.iter().map(String::as_str).collect();
                invocation.matches(&r.program, &wanted)
            })
            .map(|r| r.output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));

        self.lock().push(invocation);
        output
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError> {
        Ok(self.respond(program, args, None))
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<CommandOutput, ProvisionError> {
        Ok(self.respond(program, args, Some(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_commands_succeed() {
        let runner = MockRunner::new();
        let out = runner.run("groupadd", &["docker"]).await.unwrap();
        assert!(out.success());
        assert!(runner.was_called("groupadd", &["docker"]));
    }

    #[tokio::test]
    async fn test_scripted_response_matches_prefix() {
        let runner = MockRunner::new().with_response(
            "docker",
            &["rm"],
            CommandOutput::failed(1, "No such container"),
        );
        let out = runner.run("docker", &["rm", "-f", "cowrie"]).await.unwrap();
        assert_eq!(out.code, Some(1));

        let out = runner.run("docker", &["run", "cowrie"]).await.unwrap();
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_records_stdin() {
        let runner = MockRunner::new();
        runner
            .run_with_stdin("chpasswd", &[], b"admin:pw\n")
            .await
            .unwrap();
        let calls = runner.calls_to("chpasswd", &[]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].stdin.as_deref(), Some(&b"admin:pw\n"[..]));
    }
}

//! Interactive operator prompts
//!
//! The only blocking reads in a run: the confirmation pause and the masked
//! password entry.

use crate::ProvisionError;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A password that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext; only the account step should call this
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Source of operator input
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question
    fn confirm(&self, question: &str) -> Result<bool, ProvisionError>;

    /// Read a password without echoing it
    fn password(&self, prompt: &str) -> Result<Secret, ProvisionError>;
}

/// Terminal prompts via dialoguer
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool, ProvisionError> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| ProvisionError::Prompt(e.to_string()))
    }

    fn password(&self, prompt: &str) -> Result<Secret, ProvisionError> {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .interact()
            .map(Secret::new)
            .map_err(|e| ProvisionError::Prompt(e.to_string()))
    }
}

/// Prompter answering from a fixed script (useful for testing)
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirm: bool,
    passwords: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    /// Confirms and answers every password prompt in order
    pub fn new(passwords: &[&str]) -> Self {
        Self {
            confirm: true,
            passwords: Mutex::new(passwords.iter().map(|p| p.to_string()).collect()),
        }
    }

    /// Declines the confirmation prompt
    pub fn declining() -> Self {
        Self::default()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _question: &str) -> Result<bool, ProvisionError> {
        Ok(self.confirm)
    }

    fn password(&self, _prompt: &str) -> Result<Secret, ProvisionError> {
        self.passwords
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .map(Secret::new)
            .ok_or_else(|| ProvisionError::Prompt("no scripted password left".to_string()))
    }
}

/// Prompt twice and require both entries to match
pub fn collect_password(prompter: &dyn Prompter, user: &str) -> Result<Secret, ProvisionError> {
    let first = prompter.password(&format!("Password for {}", user))?;
    let second = prompter.password("Repeat password")?;

    if first != second {
        return Err(ProvisionError::PasswordMismatch);
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_matching_passwords() {
        let prompter = ScriptedPrompter::new(&["s3cret", "s3cret"]);
        let secret = collect_password(&prompter, "admin").unwrap();
        assert_eq!(secret.expose(), "s3cret");
    }

    #[test]
    fn test_mismatched_passwords() {
        let prompter = ScriptedPrompter::new(&["s3cret", "s3cert"]);
        let err = collect_password(&prompter, "admin").unwrap_err();
        assert!(matches!(err, ProvisionError::PasswordMismatch));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_declining_prompter() {
        let prompter = ScriptedPrompter::declining();
        assert!(!prompter.confirm("Proceed?").unwrap());
    }
}

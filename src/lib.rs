//! host-provision library
//!
//! One-shot bootstrap of a fresh Linux server: Docker and Fail2Ban, an
//! administrative user with key-based SSH on a non-default port, a Cowrie
//! honeypot on the old port, and the user's crontab.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Idempotent**: every step checks the host before changing it
//! - **Testable**: external commands go through [`exec::CommandRunner`] and
//!   host files through [`state::HostPaths`], both replaceable in tests

pub mod config;
pub mod exec;
pub mod modules;
pub mod prompt;
pub mod provisioner;
pub mod runner;
pub mod state;
pub mod template;

mod error;

pub use config::ProvisionRequest;
pub use error::ProvisionError;
pub use provisioner::Provisioner;
pub use runner::RunReport;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::registry::ServerRecord;

pub mod encoding;
pub mod ssh;

pub use ssh::SshExecutor;

/// Result of a command that ran to completion on the remote side.
/// A non-zero `exit_code` is still a completed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures to establish or keep the remote session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Failed to start ssh client: {0}")]
    Spawn(String),
    #[error("Authentication failed for {login}@{address}")]
    Authentication { login: String, address: String },
    #[error("Host key for {0} was rejected")]
    HostKey(String),
    #[error("Connection to {address} failed: {reason}")]
    Connection { address: String, reason: String },
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
    #[error("I/O error while running command: {0}")]
    Io(String),
}

/// Runs one shell command on a server over a fresh session.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, server: &ServerRecord, command: &str)
    -> Result<CommandOutput, ExecError>;
}

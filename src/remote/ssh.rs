use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempPath;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use super::encoding::decode_output;
use super::{CommandExecutor, CommandOutput, ExecError};
use crate::registry::ServerRecord;

const SECRET_ENV: &str = "SITEWATCH_SSH_SECRET";
const SSH_CONNECT_TIMEOUT_SECONDS: u64 = 10;
/// ssh reserves this status for its own failures.
const SSH_ERROR_EXIT: i32 = 255;

/// Runs commands through the system `ssh` client. Password credentials are fed
/// through an askpass helper that reads the secret from the child environment,
/// so it never appears on a command line.
pub struct SshExecutor {
    ssh_binary: String,
    askpass_path: TempPath,
    command_timeout: Duration,
}

impl SshExecutor {
    pub fn new(command_timeout: Duration) -> std::io::Result<Self> {
        Self::with_binary("ssh", command_timeout)
    }

    pub fn with_binary(ssh_binary: &str, command_timeout: Duration) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("sitewatch-askpass-")
            .suffix(".sh")
            .tempfile()?;
        writeln!(file, "#!/bin/sh")?;
        writeln!(file, "printf '%s\\n' \"${SECRET_ENV}\"")?;
        file.flush()?;

        let askpass_path = file.into_temp_path();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&askpass_path, std::fs::Permissions::from_mode(0o700))?;
        }
        info!(path = ?askpass_path, "Prepared ssh askpass helper.");

        Ok(Self {
            ssh_binary: ssh_binary.to_string(),
            askpass_path,
            command_timeout,
        })
    }

    fn build_command(&self, server: &ServerRecord, command: &str) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.ssh_binary);
        cmd.arg("-p")
            .arg(server.port.to_string())
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!("ConnectTimeout={SSH_CONNECT_TIMEOUT_SECONDS}"))
            .args(["-o", "NumberOfPasswordPrompts=1"])
            .args(["-o", "PreferredAuthentications=keyboard-interactive,password"])
            .arg(format!("{}@{}", server.login, server.address))
            .arg(command);
        cmd.env("SSH_ASKPASS", &*self.askpass_path)
            .env("SSH_ASKPASS_REQUIRE", "force")
            .env(SECRET_ENV, &server.secret)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Splits ssh's own failures (exit 255) from the remote command's status.
fn classify_exit(server: &ServerRecord, exit_code: i32, stderr: &str) -> Result<(), ExecError> {
    if exit_code != SSH_ERROR_EXIT {
        return Ok(());
    }
    if stderr.contains("Permission denied") {
        return Err(ExecError::Authentication {
            login: server.login.clone(),
            address: server.address.clone(),
        });
    }
    if stderr.contains("Host key verification failed")
        || stderr.contains("REMOTE HOST IDENTIFICATION HAS CHANGED")
    {
        return Err(ExecError::HostKey(server.address.clone()));
    }
    let reason = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("ssh exited with status 255")
        .trim()
        .to_string();
    Err(ExecError::Connection {
        address: server.address.clone(),
        reason,
    })
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn execute(
        &self,
        server: &ServerRecord,
        command: &str,
    ) -> Result<CommandOutput, ExecError> {
        let child = self
            .build_command(server, command)
            .spawn()
            .map_err(|e| ExecError::Spawn(e.to_string()))?;
        debug!(address = %server.address, pid = ?child.id(), %command, "Spawned ssh session.");

        // Dropping the future on timeout kills the child (kill_on_drop).
        let waited = tokio::time::timeout(self.command_timeout, child.wait_with_output()).await;
        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecError::Io(e.to_string())),
            Err(_) => {
                warn!(address = %server.address, %command, "Remote command timed out.");
                return Err(ExecError::Timeout(self.command_timeout));
            }
        };

        let stdout = decode_output(&output.stdout);
        let stderr = decode_output(&output.stderr);
        // No exit code means the local client was killed by a signal.
        let exit_code = output.status.code().ok_or_else(|| ExecError::Connection {
            address: server.address.clone(),
            reason: format!("ssh client terminated: {}", output.status),
        })?;

        classify_exit(server, exit_code, &stderr)?;

        for line in stdout.lines() {
            debug!(address = %server.address, "STDOUT: {}", line);
        }
        for line in stderr.lines() {
            debug!(address = %server.address, "STDERR: {}", line);
        }

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

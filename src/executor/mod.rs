//! Command execution on cluster hosts
//!
//! The [`Executor`] trait is the only way the engine touches a host. Callers
//! decide concurrency; an executor runs one command per call and reports
//! failures without distinguishing an unreachable host from a failing
//! command.

pub mod local;
pub mod ssh;

pub use local::LocalExecutor;
pub use ssh::{SshConfig, SshExecutor};

use crate::context::Context;
use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: Vec<u8>,
    /// Standard error
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    /// Standard output as text
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Standard error as text
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Runs a command on one host
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command`, optionally as superuser
    async fn execute(&self, ctx: &Context, command: &str, sudo: bool) -> Result<ExecOutput>;
}

/// Quote `arg` as one single-quoted shell word
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quote a path glob, leaving a trailing `*` component unquoted so the shell expands it
pub fn shell_quote_glob(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) if idx > 0 && path[idx..].contains('*') => {
            format!("{}{}", shell_quote(&path[..idx]), &path[idx..])
        }
        _ => shell_quote(path),
    }
}

/// Wrap a command so it runs as root through a login-less shell
pub fn sudo_command(command: &str) -> String {
    format!("sudo -H bash -c {}", shell_quote(command))
}

/// Spawn a process, wait for it and turn a non-zero exit into an error
pub(crate) async fn run_process(
    host: &str,
    command: &str,
    program: &str,
    args: &[String],
) -> Result<ExecOutput> {
    tracing::debug!(host, command, "executing");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ClusterError::Execution {
            host: host.to_string(),
            command: command.to_string(),
            message: format!("failed to spawn {}: {}", program, e),
        })?;

    let result = ExecOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    };

    if !output.status.success() {
        return Err(ClusterError::Execution {
            host: host.to_string(),
            command: command.to_string(),
            message: format!("{}, stderr: {}", output.status, result.stderr_str().trim()),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_command_quotes() {
        assert_eq!(sudo_command("ls /"), "sudo -H bash -c 'ls /'");
        assert_eq!(
            sudo_command("echo 'hi'"),
            r"sudo -H bash -c 'echo '\''hi'\'''"
        );
    }

    #[test]
    fn test_shell_quote_glob() {
        assert_eq!(shell_quote_glob("/data/my dir/*"), "'/data/my dir'/*");
        assert_eq!(shell_quote_glob("/var/log/a b/*.log"), "'/var/log/a b'/*.log");
        assert_eq!(shell_quote_glob("/opt/x y/tls"), "'/opt/x y/tls'");
        assert_eq!(shell_quote_glob("/it's/*"), r"'/it'\''s'/*");
    }
}

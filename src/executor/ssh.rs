//! Executor backed by the system OpenSSH client

use super::{run_process, sudo_command, ExecOutput, Executor};
use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SSH connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Login user
    pub user: String,
    /// Private key, the client default when unset
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: crate::topology::config::DEFAULT_USER.to_string(),
            identity_file: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5
}

/// Runs commands on a remote host over `ssh`
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    port: u16,
    config: SshConfig,
}

impl SshExecutor {
    /// Create an executor for `host:port`
    pub fn new(host: &str, port: u16, config: SshConfig) -> Self {
        Self {
            host: host.to_string(),
            port,
            config,
        }
    }

    /// Arguments passed to the `ssh` binary
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().to_string());
        }
        args.push(format!("{}@{}", self.config.user, self.host));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn execute(&self, _ctx: &Context, command: &str, sudo: bool) -> Result<ExecOutput> {
        let command = if sudo {
            sudo_command(command)
        } else {
            command.to_string()
        };
        let args = self.ssh_args(&command);
        run_process(&self.host, &command, "ssh", &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_args() {
        let config = SshConfig {
            user: "ops".to_string(),
            identity_file: Some(PathBuf::from("/keys/id_ed25519")),
            connect_timeout: 10,
        };
        let exec = SshExecutor::new("10.0.0.5", 2222, config);
        let args = exec.ssh_args("uptime");

        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert!(args.windows(2).any(|w| w[0] == "-i" && w[1] == "/keys/id_ed25519"));
        assert_eq!(args[args.len() - 2], "ops@10.0.0.5");
        assert_eq!(args[args.len() - 1], "uptime");
    }
}

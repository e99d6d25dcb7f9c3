//! Executor for the machine running the CLI

use super::{run_process, sudo_command, ExecOutput, Executor};
use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;

/// Runs commands through the local `bash`
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a local executor
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, _ctx: &Context, command: &str, sudo: bool) -> Result<ExecOutput> {
        let command = if sudo {
            sudo_command(command)
        } else {
            command.to_string()
        };
        let args = vec!["-c".to_string(), command.clone()];
        run_process("localhost", &command, "bash", &args).await
    }
}

//! Scripted executor shared by unit tests

use crate::context::Context;
use crate::error::{ClusterError, Result};
use crate::executor::{ExecOutput, Executor};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Commands seen by every mock executor of a test, in issue order
pub type CommandLog = Arc<Mutex<Vec<(String, String)>>>;

type Responder = dyn Fn(&str) -> Result<ExecOutput> + Send + Sync;

/// Executor that records commands and answers them with a closure
pub struct MockExecutor {
    host: String,
    log: CommandLog,
    responder: Box<Responder>,
}

impl MockExecutor {
    pub fn new<F>(host: &str, log: CommandLog, responder: F) -> Self
    where
        F: Fn(&str) -> Result<ExecOutput> + Send + Sync + 'static,
    {
        Self {
            host: host.to_string(),
            log,
            responder: Box::new(responder),
        }
    }

    /// Every command succeeds with `stdout`
    pub fn replying(host: &str, log: CommandLog, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(host, log, move |_| Ok(output(&stdout)))
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, _ctx: &Context, command: &str, _sudo: bool) -> Result<ExecOutput> {
        self.log
            .lock()
            .map_err(|_| ClusterError::Internal("command log poisoned".to_string()))?
            .push((self.host.clone(), command.to_string()));
        (self.responder)(command)
    }
}

pub fn output(stdout: &str) -> ExecOutput {
    ExecOutput {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

pub fn new_log() -> CommandLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn commands(log: &CommandLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
}

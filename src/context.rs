//! Execution context shared by every step of one run

use crate::error::{ClusterError, Result};
use crate::executor::Executor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default number of simultaneous per-instance operations
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Execution context for one pipeline run
///
/// Carries the concurrency budget, the cancellation token and the executor of
/// every host. Cloning is cheap and clones share the same executors.
#[derive(Clone)]
pub struct Context {
    concurrency: usize,
    cancel: CancellationToken,
    executors: Arc<HashMap<String, Arc<dyn Executor>>>,
}

impl Context {
    /// Create a context with the given concurrency budget
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
            executors: Arc::new(HashMap::new()),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register the executor for a host
    pub fn with_executor(mut self, host: &str, executor: Arc<dyn Executor>) -> Self {
        Arc::make_mut(&mut self.executors).insert(host.to_string(), executor);
        self
    }

    /// Maximum number of simultaneous units of work
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Token cancelled when the run should stop issuing work
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`ClusterError::Cancelled`] if the run was cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ClusterError::Cancelled);
        }
        Ok(())
    }

    /// Context whose cancellation does not propagate back to this one
    pub fn child(&self) -> Self {
        Self {
            concurrency: self.concurrency,
            cancel: self.cancel.child_token(),
            executors: self.executors.clone(),
        }
    }

    /// Executor registered for `host`
    pub fn executor(&self, host: &str) -> Result<Arc<dyn Executor>> {
        self.executors
            .get(host)
            .cloned()
            .ok_or_else(|| ClusterError::ExecutorNotFound(host.to_string()))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut hosts: Vec<&String> = self.executors.keys().collect();
        hosts.sort();
        f.debug_struct("Context")
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.is_cancelled())
            .field("hosts", &hosts)
            .finish()
    }
}

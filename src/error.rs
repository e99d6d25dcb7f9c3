//! Error types for rune-cluster

use std::time::Duration;
use thiserror::Error;

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Coarse classification of a [`ClusterError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Topology or metadata failed semantic checks
    Validation,
    /// Executor transport or remote command failure
    Execution,
    /// A confirmation poll ran out of time
    Timeout,
    /// The operator declined a confirmation prompt
    UserAborted,
    /// A scale-out/in is in progress for the cluster
    ClusterLocked,
    /// The run was cancelled from outside
    Cancelled,
    /// Bad configuration or unreadable metadata
    Config,
    /// Local filesystem failure
    Io,
}

/// Cluster operation error types
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Topology validation failed: {0}")]
    Validation(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("No executor registered for host {0}")]
    ExecutorNotFound(String),

    #[error("Failed to execute `{command}` on {host}: {message}")]
    Execution {
        host: String,
        command: String,
        message: String,
    },

    #[error("timed out waiting for port {port} to be {state} after {timeout:?}")]
    WaitTimeout {
        port: u16,
        state: String,
        timeout: Duration,
    },

    #[error("Operation timed out after {timeout:?}: {last}")]
    RetryTimeout { timeout: Duration, last: String },

    #[error("Operation aborted by user")]
    UserAborted,

    #[error("Cluster {0} is locked by a scale-out/in operation, finish or clear it first")]
    ClusterLocked(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Step `{name}` failed: {source}")]
    Step {
        name: String,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClusterError {
    /// Wrap an error with the name of the pipeline step that produced it
    pub fn step(name: impl Into<String>, source: ClusterError) -> Self {
        ClusterError::Step {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Classify the error, looking through step wrappers to the cause
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::Step { source, .. } => source.kind(),
            ClusterError::Validation(_) | ClusterError::ComponentNotFound(_) => {
                ErrorKind::Validation
            }
            ClusterError::Execution { .. } | ClusterError::ExecutorNotFound(_) => {
                ErrorKind::Execution
            }
            ClusterError::WaitTimeout { .. } | ClusterError::RetryTimeout { .. } => {
                ErrorKind::Timeout
            }
            ClusterError::UserAborted => ErrorKind::UserAborted,
            ClusterError::ClusterLocked(_) => ErrorKind::ClusterLocked,
            ClusterError::Cancelled => ErrorKind::Cancelled,
            ClusterError::Io(_) => ErrorKind::Io,
            ClusterError::ClusterNotFound(_)
            | ClusterError::InvalidConfig(_)
            | ClusterError::Yaml(_)
            | ClusterError::Json(_)
            | ClusterError::Internal(_) => ErrorKind::Config,
        }
    }

    /// True when the operator declined to continue; not a failure
    pub fn is_user_abort(&self) -> bool {
        self.kind() == ErrorKind::UserAborted
    }
}

impl From<serde_yaml::Error> for ClusterError {
    fn from(e: serde_yaml::Error) -> Self {
        ClusterError::Yaml(e.to_string())
    }
}

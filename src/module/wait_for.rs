//! Wait for a port to be opened or closed on a host

use crate::context::Context;
use crate::error::{ClusterError, Result};
use crate::executor::Executor;
use crate::retry::{retry, Attempt, RetryOption};
use crate::topology::OsKind;
use std::time::Duration;

/// Label prefix of launchd services managed by rune-cluster
pub const LAUNCHD_LABEL_PREFIX: &str = "com.evoker.rune-cluster";

/// Desired port state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PortState {
    /// Something listens on the port
    #[default]
    Started,
    /// Nothing listens on the port
    Stopped,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Started => write!(f, "started"),
            PortState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Configuration of one wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitForConfig {
    /// Port to poll
    pub port: u16,
    /// Pause between checks, one second when zero
    pub sleep: Duration,
    /// State to wait for
    pub state: PortState,
    /// Maximum time to wait, sixty seconds when zero
    pub timeout: Duration,
    /// Operating system of the polled host
    pub os: OsKind,
}

impl WaitForConfig {
    /// Wait for `port` to be started with default timings
    pub fn new(port: u16, os: OsKind) -> Self {
        Self {
            port,
            sleep: Duration::from_secs(1),
            state: PortState::Started,
            timeout: Duration::from_secs(60),
            os,
        }
    }

    /// Set the desired state
    pub fn state(mut self, state: PortState) -> Self {
        self.state = state;
        self
    }

    /// Set the overall timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause between checks
    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }
}

/// How one operating system reports listening ports
pub trait DetectionStrategy: Send + Sync {
    /// Command printing the evidence for `port`
    fn command(&self, port: u16, state: PortState) -> String;

    /// Whether the command output shows `port` in `state`
    fn is_satisfied(&self, stdout: &[u8], port: u16, state: PortState) -> bool;
}

/// Linux: listening TCP sockets from `ss`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxDetection;

impl DetectionStrategy for LinuxDetection {
    fn command(&self, _port: u16, _state: PortState) -> String {
        "ss -ltn".to_string()
    }

    fn is_satisfied(&self, stdout: &[u8], port: u16, state: PortState) -> bool {
        let pattern = format!(":{} ", port);
        let listening = contains(stdout, pattern.as_bytes());
        match state {
            PortState::Started => listening,
            PortState::Stopped => !listening,
        }
    }
}

/// macOS: `lsof` for open ports, the launchd job table for stopped services
#[derive(Debug, Clone)]
pub struct DarwinDetection {
    label_prefix: String,
}

impl DarwinDetection {
    /// Detection for services labelled with `label_prefix`
    pub fn new(label_prefix: &str) -> Self {
        Self {
            label_prefix: label_prefix.to_string(),
        }
    }
}

impl Default for DarwinDetection {
    fn default() -> Self {
        Self::new(LAUNCHD_LABEL_PREFIX)
    }
}

impl DetectionStrategy for DarwinDetection {
    fn command(&self, port: u16, state: PortState) -> String {
        match state {
            PortState::Started => format!("lsof -i:{} || true", port),
            // grep exits non-zero once the job is gone
            PortState::Stopped => format!(
                "launchctl list | grep {} | grep {} || true",
                self.label_prefix, port
            ),
        }
    }

    fn is_satisfied(&self, stdout: &[u8], port: u16, state: PortState) -> bool {
        match state {
            PortState::Started => contains(stdout, b"LISTEN"),
            PortState::Stopped => {
                // grep matched the port as a substring; only `<unit>-<port>` labels count
                let suffix = format!("-{}", port);
                let text = String::from_utf8_lossy(stdout);
                let stopped = text
                    .lines()
                    .filter_map(|line| {
                        let fields: Vec<&str> = line.split_whitespace().collect();
                        match (fields.first(), fields.last()) {
                            (Some(pid), Some(label)) if label.ends_with(&suffix) => Some(*pid),
                            _ => None,
                        }
                    })
                    // launchctl prints `-` in the PID column of jobs that are not running
                    .all(|pid| pid == "-");
                stopped
            }
        }
    }
}

/// Detection strategy for an operating system
pub fn strategy_for(os: OsKind) -> Box<dyn DetectionStrategy> {
    match os {
        OsKind::Linux => Box::new(LinuxDetection),
        OsKind::Darwin => Box::new(DarwinDetection::default()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Polls a host until a port reaches the desired state
pub struct WaitFor {
    config: WaitForConfig,
    strategy: Box<dyn DetectionStrategy>,
}

impl WaitFor {
    /// Create a wait, filling zero timings with their defaults
    pub fn new(mut config: WaitForConfig) -> Self {
        if config.sleep.is_zero() {
            config.sleep = Duration::from_secs(1);
        }
        if config.timeout.is_zero() {
            config.timeout = Duration::from_secs(60);
        }
        let strategy = strategy_for(config.os);
        Self { config, strategy }
    }

    /// Replace the detection strategy
    pub fn with_strategy(mut self, strategy: Box<dyn DetectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Effective configuration
    pub fn config(&self) -> &WaitForConfig {
        &self.config
    }

    /// Poll until satisfied
    ///
    /// Executor failures abort the wait and are returned as they are. Running
    /// out of time yields [`ClusterError::WaitTimeout`]; the last detection
    /// detail is only logged.
    pub async fn execute(&self, ctx: &Context, executor: &dyn Executor) -> Result<()> {
        let WaitForConfig {
            port,
            sleep,
            state,
            timeout,
            ..
        } = self.config;

        let command = self.strategy.command(port, state);
        let command = command.as_str();
        let strategy = self.strategy.as_ref();

        let poll = retry(
            move || async move {
                let out = executor.execute(ctx, command, false).await?;
                if strategy.is_satisfied(&out.stdout, port, state) {
                    Ok(Attempt::Done)
                } else {
                    Ok(Attempt::Pending(format!(
                        "port {} not yet {}, `{}` printed: {}",
                        port,
                        state,
                        command,
                        out.stdout_str().trim()
                    )))
                }
            },
            RetryOption {
                delay: sleep,
                timeout,
            },
        );

        let result = tokio::select! {
            result = poll => result,
            _ = ctx.cancel_token().cancelled() => Err(ClusterError::Cancelled),
        };

        match result {
            Ok(()) => Ok(()),
            Err(ClusterError::RetryTimeout { last, .. }) => {
                tracing::debug!("retry error: {}", last);
                Err(ClusterError::WaitTimeout {
                    port,
                    state: state.to_string(),
                    timeout,
                })
            }
            Err(e) => Err(e),
        }
    }
}

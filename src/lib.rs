//! Rune Cluster - lifecycle operations for multi-host service clusters
//!
//! A cluster is a set of role-typed service instances spread over many
//! hosts. This crate turns a stored topology plus an operator intent into an
//! ordered, partially parallel sequence of remote commands:
//!
//! - Start, stop, restart, enable and disable in dependency order
//! - Port confirmation polling with per-OS detection
//! - Bounded fan-out across hosts with fail-fast cancellation
//! - Topology-aware cleanup of data, log and TLS files
//! - Per-day command history

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod history;
pub mod manager;
pub mod module;
pub mod operation;
pub mod retry;
pub mod task;
pub mod topology;

#[cfg(test)]
mod testing;

pub use error::{ClusterError, ErrorKind, Result};

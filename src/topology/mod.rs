//! Cluster topology
//!
//! A topology is the validated, read-only description of a cluster: its
//! components, their instances and the order in which components start and
//! stop.

pub mod cluster;
pub mod config;
pub mod parser;

pub use cluster::{abs_path, join_path, Component, HostInfo, Instance, Topology, TLS_CERT_KEY_DIR};
pub use config::{GlobalOptions, MonitoredOptions, OsKind, TopologyConfig};
pub use parser::TopologyParser;

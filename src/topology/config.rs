//! Topology file configuration types

use serde::{Deserialize, Serialize};

/// Default deploy user
pub const DEFAULT_USER: &str = "rune";

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Operating system of a host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    /// Linux with systemd
    #[default]
    Linux,
    /// macOS with launchd
    Darwin,
}

impl std::fmt::Display for OsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsKind::Linux => write!(f, "linux"),
            OsKind::Darwin => write!(f, "darwin"),
        }
    }
}

/// Topology file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Cluster-wide defaults
    #[serde(default)]
    pub global: GlobalOptions,
    /// Monitoring agent deployment, if any
    #[serde(default)]
    pub monitored: Option<MonitoredOptions>,
    /// Components, in declaration order
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

/// Cluster-wide options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalOptions {
    /// Deploy user on every host
    #[serde(default = "default_user")]
    pub user: String,
    /// Default SSH port
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Default operating system
    #[serde(default)]
    pub os: OsKind,
    /// Default architecture
    #[serde(default = "default_arch")]
    pub arch: String,
    /// Base deploy directory
    #[serde(default = "default_deploy_dir")]
    pub deploy_dir: String,
    /// Base data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Base log directory, defaults to `<deploy_dir>/log` per instance
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Cluster-wide TLS between components
    #[serde(default)]
    pub enable_tls: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            user: default_user(),
            ssh_port: default_ssh_port(),
            os: OsKind::default(),
            arch: default_arch(),
            deploy_dir: default_deploy_dir(),
            data_dir: default_data_dir(),
            log_dir: None,
            enable_tls: false,
        }
    }
}

/// Monitoring agent options, one agent set per host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredOptions {
    /// Node exporter port
    #[serde(default = "default_node_exporter_port")]
    pub node_exporter_port: u16,
    /// Blackbox exporter port
    #[serde(default = "default_blackbox_exporter_port")]
    pub blackbox_exporter_port: u16,
    /// Agent deploy directory
    #[serde(default = "default_monitored_deploy_dir")]
    pub deploy_dir: String,
    /// Agent data directory, relative paths live under `deploy_dir`
    #[serde(default = "default_monitored_data_dir")]
    pub data_dir: String,
    /// Agent log directory
    #[serde(default = "default_monitored_log_dir")]
    pub log_dir: String,
}

impl Default for MonitoredOptions {
    fn default() -> Self {
        Self {
            node_exporter_port: default_node_exporter_port(),
            blackbox_exporter_port: default_blackbox_exporter_port(),
            deploy_dir: default_monitored_deploy_dir(),
            data_dir: default_monitored_data_dir(),
            log_dir: default_monitored_log_dir(),
        }
    }
}

/// Component (role) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component name, e.g. `pd` or `storage`
    pub name: String,
    /// Components that must be fully started before this one
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Instances of the component
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

/// Instance configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Host address
    pub host: String,
    /// Service port
    pub port: u16,
    /// SSH port, falls back to the global one
    #[serde(default)]
    pub ssh_port: Option<u16>,
    /// Operating system, falls back to the global one
    #[serde(default)]
    pub os: Option<OsKind>,
    /// Architecture, falls back to the global one
    #[serde(default)]
    pub arch: Option<String>,
    /// Deploy directory
    #[serde(default)]
    pub deploy_dir: Option<String>,
    /// Comma separated data directories
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Comma separated log directories
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Do not run monitoring agents on this host
    #[serde(default)]
    pub ignore_exporter: bool,
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_arch() -> String {
    "amd64".to_string()
}

fn default_deploy_dir() -> String {
    "deploy".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_node_exporter_port() -> u16 {
    9100
}

fn default_blackbox_exporter_port() -> u16 {
    9115
}

fn default_monitored_deploy_dir() -> String {
    "deploy/monitor".to_string()
}

fn default_monitored_data_dir() -> String {
    "data".to_string()
}

fn default_monitored_log_dir() -> String {
    "deploy/monitor/log".to_string()
}

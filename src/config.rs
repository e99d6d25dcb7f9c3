//! Profile configuration
//!
//! The profile directory holds cluster metadata, command history and an
//! optional `config.yaml` overriding the defaults below.

use crate::context::DEFAULT_CONCURRENCY;
use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the profile directory
pub const PROFILE_ENV: &str = "RUNE_CLUSTER_HOME";

/// Optional configuration file inside the profile directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Settings for one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Root of cluster metadata and history
    #[serde(skip)]
    pub profile_dir: PathBuf,
    /// How to reach hosts
    #[serde(default)]
    pub ssh: SshOptions,
    /// Default concurrency budget
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default seconds to wait for a port to change state
    #[serde(default = "default_op_timeout")]
    pub op_timeout: u64,
}

/// SSH settings shared by every cluster of the profile
///
/// The login user is the deploy user of each cluster's topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshOptions {
    /// Private key, the client default when unset
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Connection timeout in seconds, used when `--ssh-timeout` is not given
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            identity_file: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_op_timeout() -> u64 {
    120
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            ssh: SshOptions::default(),
            concurrency: default_concurrency(),
            op_timeout: default_op_timeout(),
        }
    }
}

/// `$RUNE_CLUSTER_HOME`, else the platform data directory
pub fn default_profile_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(PROFILE_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("rune-cluster")
}

impl ClusterConfig {
    /// Load the configuration of the default profile
    pub fn load() -> Result<Self> {
        Self::load_from(&default_profile_dir())
    }

    /// Load the configuration of the profile at `profile_dir`
    pub fn load_from(profile_dir: &Path) -> Result<Self> {
        let path = profile_dir.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            serde_yaml::from_str::<ClusterConfig>(&content).map_err(|e| {
                ClusterError::InvalidConfig(format!("{}: {}", path.display(), e))
            })?
        } else {
            ClusterConfig::default()
        };
        config.profile_dir = profile_dir.to_path_buf();
        Ok(config)
    }

    /// Directory holding one sub-directory per cluster
    pub fn clusters_dir(&self) -> PathBuf {
        self.profile_dir.join("clusters")
    }

    /// Directory holding the per-day history files
    pub fn history_dir(&self) -> PathBuf {
        self.profile_dir.join("history")
    }
}

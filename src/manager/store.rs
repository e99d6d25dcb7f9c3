//! On-disk cluster metadata

use crate::error::{ClusterError, Result};
use crate::topology::{Topology, TopologyConfig, TopologyParser};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file inside a cluster directory
pub const META_FILE: &str = "meta.yaml";

/// Present while a scale-out/in of the cluster is unfinished
pub const SCALE_LOCK_FILE: &str = ".scale.lock";

/// Cluster metadata stored under `<root>/<name>/`
#[derive(Debug, Clone)]
pub struct ClusterStore {
    root: PathBuf,
}

impl ClusterStore {
    /// Store rooted at `root`, usually `<profile>/clusters`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one cluster
    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether metadata for `name` exists
    pub fn exists(&self, name: &str) -> bool {
        self.cluster_dir(name).join(META_FILE).is_file()
    }

    /// Names of every stored cluster, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(META_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load and resolve the topology of `name`
    ///
    /// Only resolution errors fail here; semantic checks are left to
    /// [`Topology::validate`] so callers decide whether they are fatal.
    pub fn load(&self, name: &str) -> Result<Topology> {
        let path = self.cluster_dir(name).join(META_FILE);
        if !path.is_file() {
            return Err(ClusterError::ClusterNotFound(name.to_string()));
        }
        TopologyParser::parse_file(&path)
    }

    /// Persist the topology configuration of `name`
    pub fn save(&self, name: &str, config: &TopologyConfig) -> Result<()> {
        let dir = self.cluster_dir(name);
        fs::create_dir_all(&dir)?;
        let content = serde_yaml::to_string(config)?;
        fs::write(dir.join(META_FILE), content)?;
        Ok(())
    }

    /// Refuse to continue while a scale-out/in of `name` is unfinished
    pub fn scale_locked_err(&self, name: &str) -> Result<()> {
        if self.cluster_dir(name).join(SCALE_LOCK_FILE).exists() {
            return Err(ClusterError::ClusterLocked(name.to_string()));
        }
        Ok(())
    }

    /// Set or clear the scale lock of `name`
    pub fn set_scale_lock(&self, name: &str, locked: bool) -> Result<()> {
        let lock = self.cluster_dir(name).join(SCALE_LOCK_FILE);
        if locked {
            fs::create_dir_all(self.cluster_dir(name))?;
            fs::write(lock, b"")?;
        } else if lock.exists() {
            fs::remove_file(lock)?;
        }
        Ok(())
    }
}

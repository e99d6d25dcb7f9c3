//! Topology file parser

use super::cluster::Topology;
use super::config::TopologyConfig;
use crate::error::{ClusterError, Result};
use std::path::Path;

/// Default topology file names
pub const DEFAULT_TOPOLOGY_FILES: &[&str] = &["topology.yaml", "topology.yml", "meta.yaml"];

/// Topology file parser
pub struct TopologyParser;

impl TopologyParser {
    /// Find a topology file in a directory
    pub fn find_topology_file(dir: &Path) -> Option<std::path::PathBuf> {
        DEFAULT_TOPOLOGY_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Parse a topology file from path
    pub fn parse_file(path: &Path) -> Result<Topology> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClusterError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse a topology from a YAML string
    pub fn parse_str(content: &str) -> Result<Topology> {
        let config = Self::parse_config(content)?;
        Topology::from_config(config)
    }

    /// Parse the raw configuration without resolving it
    pub fn parse_config(content: &str) -> Result<TopologyConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| ClusterError::Yaml(format!("failed to parse topology: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::OsKind;
    use tempfile::tempdir;

    #[test]
    fn test_parse_defaults() {
        let yaml = r#"
components:
  - name: meta
    instances:
      - host: 10.0.0.1
        port: 2379
        os: darwin
"#;
        let config = TopologyParser::parse_config(yaml).unwrap();
        assert_eq!(config.global.user, "rune");
        assert_eq!(config.global.ssh_port, 22);
        assert!(!config.global.enable_tls);
        assert!(config.monitored.is_none());
        assert_eq!(config.components[0].instances[0].os, Some(OsKind::Darwin));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(TopologyParser::parse_str("components: [").is_err());
    }

    #[test]
    fn test_find_and_parse_file() {
        let dir = tempdir().unwrap();
        assert!(TopologyParser::find_topology_file(dir.path()).is_none());

        std::fs::write(
            dir.path().join("meta.yaml"),
            "components:\n  - name: meta\n",
        )
        .unwrap();

        let path = TopologyParser::find_topology_file(dir.path()).unwrap();
        let topo = TopologyParser::parse_file(&path).unwrap();
        assert_eq!(topo.components().len(), 1);
    }
}

//! Cluster lifecycle operations
//!
//! Each operation walks the topology component by component. Components are
//! hard barriers: every instance of one component finishes before the next
//! component begins. Instances of one component run in parallel within the
//! concurrency budget.

pub mod action;
pub mod service;

pub use action::{
    append_steps, build_task, enable, restart, start, stop, ClusterAction, ClusterStep, Operation,
    BLACKBOX_EXPORTER, NODE_EXPORTER,
};
pub use service::{service_command, ServiceVerb};

use crate::context::DEFAULT_CONCURRENCY;
use crate::topology::Instance;
use std::time::Duration;

/// Options shared by every lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Maximum simultaneous per-instance operations
    pub concurrency: usize,
    /// Only touch these instance IDs or hosts; empty means all
    pub nodes: Vec<String>,
    /// Only touch these components; empty means all
    pub roles: Vec<String>,
    /// Do not ask before destructive operations
    pub skip_confirm: bool,
    /// Seconds to wait for a port to change state
    pub op_timeout: u64,
    /// Seconds allowed to establish an SSH connection
    pub ssh_timeout: u64,
    /// After stopping an instance, wait until its port is closed
    pub confirm_stopped: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            nodes: Vec::new(),
            roles: Vec::new(),
            skip_confirm: false,
            op_timeout: 120,
            ssh_timeout: 5,
            confirm_stopped: false,
        }
    }
}

impl Options {
    /// Port state timeout as a duration
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout)
    }

    /// Whether `inst` passes the node and role filters
    pub fn selects(&self, inst: &Instance) -> bool {
        let role_ok = self.roles.is_empty() || self.roles.iter().any(|r| *r == inst.component);
        let node_ok = self.nodes.is_empty()
            || self
                .nodes
                .iter()
                .any(|n| *n == inst.id() || *n == inst.host);
        role_ok && node_ok
    }

    /// Whether monitoring agents on `host` are in scope
    pub fn selects_agent_host(&self, host: &str) -> bool {
        self.roles.is_empty() && (self.nodes.is_empty() || self.nodes.iter().any(|n| n == host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyParser;

    #[test]
    fn test_filters() {
        let topo = TopologyParser::parse_str(
            r#"
components:
  - name: meta
    instances:
      - host: h1
        port: 2379
      - host: h2
        port: 2379
"#,
        )
        .unwrap();
        let instances = &topo.component("meta").unwrap().instances;

        let all = Options::default();
        assert!(instances.iter().all(|i| all.selects(i)));

        let by_id = Options {
            nodes: vec!["h2:2379".to_string()],
            ..Default::default()
        };
        assert!(!by_id.selects(&instances[0]));
        assert!(by_id.selects(&instances[1]));

        let by_role = Options {
            roles: vec!["storage".to_string()],
            ..Default::default()
        };
        assert!(!by_role.selects(&instances[0]));
        assert!(!by_role.selects_agent_host("h1"));

        let by_host = Options {
            nodes: vec!["h1".to_string()],
            ..Default::default()
        };
        assert!(by_host.selects(&instances[0]));
        assert!(by_host.selects_agent_host("h1"));
        assert!(!by_host.selects_agent_host("h2"));
    }
}

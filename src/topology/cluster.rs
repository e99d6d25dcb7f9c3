//! Resolved cluster topology

use super::config::{
    ComponentConfig, GlobalOptions, InstanceConfig, MonitoredOptions, OsKind, TopologyConfig,
};
use crate::error::{ClusterError, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Directory holding TLS certificates and keys, relative to a deploy directory
pub const TLS_CERT_KEY_DIR: &str = "tls";

/// Resolve `dir` against the deploy user's home when it is relative
pub fn abs_path(user: &str, dir: &str) -> String {
    if dir.starts_with('/') {
        return dir.to_string();
    }
    join_path(&format!("/home/{}", user), dir)
}

/// Join two path fragments with a single separator
pub fn join_path(base: &str, tail: &str) -> String {
    Path::new(base).join(tail).to_string_lossy().to_string()
}

/// Connection facts about a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// SSH port
    pub ssh_port: u16,
    /// Operating system
    pub os: OsKind,
    /// Architecture
    pub arch: String,
}

/// One deployed unit of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Owning component name
    pub component: String,
    /// Host address
    pub host: String,
    /// Service port
    pub port: u16,
    /// SSH port
    pub ssh_port: u16,
    /// Operating system
    pub os: OsKind,
    /// Architecture
    pub arch: String,
    /// Absolute deploy directory
    pub deploy_dir: String,
    /// Absolute data directories
    pub data_dirs: Vec<String>,
    /// Absolute log directories
    pub log_dirs: Vec<String>,
    /// Host must not run monitoring agents
    pub ignore_monitor_agent: bool,
}

impl Instance {
    /// Stable instance ID, `host:port`
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Service unit name on the host, `<component>-<port>`
    pub fn service_name(&self) -> String {
        format!("{}-{}", self.component, self.port)
    }

    fn resolve(component: &str, config: &InstanceConfig, global: &GlobalOptions) -> Self {
        let unit = format!("{}-{}", component, config.port);
        let user = &global.user;

        let deploy_dir = match &config.deploy_dir {
            Some(dir) => abs_path(user, dir),
            None => abs_path(user, &join_path(&global.deploy_dir, &unit)),
        };

        // relative data and log directories live under the deploy directory
        let under_deploy = |dir: &str| {
            if dir.starts_with('/') {
                dir.to_string()
            } else {
                join_path(&deploy_dir, dir)
            }
        };

        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None if global.data_dir.starts_with('/') => join_path(&global.data_dir, &unit),
            None => global.data_dir.clone(),
        };
        let log_dir = match (&config.log_dir, &global.log_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) if dir.starts_with('/') => join_path(dir, &unit),
            (None, Some(dir)) => dir.clone(),
            (None, None) => "log".to_string(),
        };

        Self {
            component: component.to_string(),
            host: config.host.clone(),
            port: config.port,
            ssh_port: config.ssh_port.unwrap_or(global.ssh_port),
            os: config.os.unwrap_or(global.os),
            arch: config.arch.clone().unwrap_or_else(|| global.arch.clone()),
            data_dirs: split_dirs(&data_dir).map(under_deploy).collect(),
            log_dirs: split_dirs(&log_dir).map(under_deploy).collect(),
            deploy_dir,
            ignore_monitor_agent: config.ignore_exporter,
        }
    }
}

fn split_dirs(dirs: &str) -> impl Iterator<Item = &str> {
    dirs.split(',').map(str::trim).filter(|d| !d.is_empty())
}

/// A role-typed group of instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component name
    pub name: String,
    /// Components started before this one
    pub depends_on: Vec<String>,
    /// Instances in declaration order
    pub instances: Vec<Instance>,
}

impl Component {
    fn resolve(config: &ComponentConfig, global: &GlobalOptions) -> Self {
        Self {
            name: config.name.clone(),
            depends_on: config.depends_on.clone(),
            instances: config
                .instances
                .iter()
                .map(|i| Instance::resolve(&config.name, i, global))
                .collect(),
        }
    }
}

/// Validated, read-only cluster description
#[derive(Debug, Clone)]
pub struct Topology {
    global: GlobalOptions,
    monitored: Option<MonitoredOptions>,
    components: Vec<Component>,
    /// Indices into `components`, dependencies first
    start_order: Vec<usize>,
}

impl Topology {
    /// Resolve a topology file, computing the component start order
    pub fn from_config(config: TopologyConfig) -> Result<Self> {
        let components: Vec<Component> = config
            .components
            .iter()
            .map(|c| Component::resolve(c, &config.global))
            .collect();

        let start_order = start_order(&components)?;

        Ok(Self {
            global: config.global,
            monitored: config.monitored,
            components,
            start_order,
        })
    }

    /// Cluster-wide options
    pub fn global(&self) -> &GlobalOptions {
        &self.global
    }

    /// Monitoring agent options
    pub fn monitored(&self) -> Option<&MonitoredOptions> {
        self.monitored.as_ref()
    }

    /// Components in declaration order
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Find a component by name
    pub fn component(&self, name: &str) -> Result<&Component> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClusterError::ComponentNotFound(name.to_string()))
    }

    /// Components ordered so that every dependency comes first
    pub fn components_by_start_order(&self) -> Vec<&Component> {
        self.start_order.iter().map(|&i| &self.components[i]).collect()
    }

    /// Exact reverse of [`Topology::components_by_start_order`]
    pub fn components_by_stop_order(&self) -> Vec<&Component> {
        self.start_order
            .iter()
            .rev()
            .map(|&i| &self.components[i])
            .collect()
    }

    /// Every instance, in start order
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.components_by_start_order()
            .into_iter()
            .flat_map(|c| c.instances.iter())
    }

    /// Unique hosts with the connection facts of the first instance seen
    pub fn hosts(&self) -> BTreeMap<String, HostInfo> {
        let mut hosts = BTreeMap::new();
        for inst in self.instances() {
            hosts.entry(inst.host.clone()).or_insert_with(|| HostInfo {
                ssh_port: inst.ssh_port,
                os: inst.os,
                arch: inst.arch.clone(),
            });
        }
        hosts
    }

    /// Hosts that carry monitoring agents, and hosts opting out of them
    pub fn monitored_hosts(&self) -> (BTreeMap<String, HostInfo>, BTreeSet<String>) {
        let no_agent: BTreeSet<String> = self
            .instances()
            .filter(|i| i.ignore_monitor_agent)
            .map(|i| i.host.clone())
            .collect();
        (self.hosts(), no_agent)
    }

    /// Semantic checks beyond what resolution enforces
    pub fn validate(&self) -> Result<()> {
        let name_re = Regex::new(r"^[a-z][a-z0-9_-]*$")
            .map_err(|e| ClusterError::Internal(e.to_string()))?;

        if self.components.is_empty() {
            return Err(ClusterError::Validation(
                "topology has no components".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for component in &self.components {
            if !name_re.is_match(&component.name) {
                return Err(ClusterError::Validation(format!(
                    "invalid component name `{}`",
                    component.name
                )));
            }
            if !names.insert(component.name.as_str()) {
                return Err(ClusterError::Validation(format!(
                    "component `{}` declared more than once",
                    component.name
                )));
            }

            for inst in &component.instances {
                if inst.host.trim().is_empty() {
                    return Err(ClusterError::Validation(format!(
                        "instance of `{}` has an empty host",
                        component.name
                    )));
                }
                if inst.port == 0 || inst.ssh_port == 0 {
                    return Err(ClusterError::Validation(format!(
                        "instance {} of `{}` has a zero port",
                        inst.id(),
                        component.name
                    )));
                }
                if !ids.insert(inst.id()) {
                    return Err(ClusterError::Validation(format!(
                        "instance {} is declared more than once",
                        inst.id()
                    )));
                }
            }
        }

        if let Some(monitored) = &self.monitored {
            for inst in self.instances() {
                if inst.port == monitored.node_exporter_port
                    || inst.port == monitored.blackbox_exporter_port
                {
                    return Err(ClusterError::Validation(format!(
                        "instance {} conflicts with a monitoring agent port",
                        inst.id()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Dependency-first ordering that otherwise keeps declaration order
fn start_order(components: &[Component]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(components.len());
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();

    for i in 0..components.len() {
        topological_sort(components, &index, i, &mut visited, &mut visiting, &mut order)?;
    }

    Ok(order)
}

fn topological_sort(
    components: &[Component],
    index: &HashMap<&str, usize>,
    current: usize,
    visited: &mut HashSet<usize>,
    visiting: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) -> Result<()> {
    if visited.contains(&current) {
        return Ok(());
    }

    let component = &components[current];
    if !visiting.insert(current) {
        return Err(ClusterError::Validation(format!(
            "circular dependency detected for component: {}",
            component.name
        )));
    }

    for dep in &component.depends_on {
        let &dep_index = index.get(dep.as_str()).ok_or_else(|| {
            ClusterError::Validation(format!(
                "component `{}` depends on unknown component `{}`",
                component.name, dep
            ))
        })?;
        topological_sort(components, index, dep_index, visited, visiting, order)?;
    }

    visiting.remove(&current);
    visited.insert(current);
    order.push(current);

    Ok(())
}

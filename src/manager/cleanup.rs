//! Files removed by `clean`

use crate::context::Context;
use crate::error::Result;
use crate::executor::shell_quote_glob;
use crate::task::{run_bounded, Step};
use crate::topology::{abs_path, join_path, Topology, TLS_CERT_KEY_DIR};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Host to the path globs to delete on it
pub type CleanupFiles = BTreeMap<String, BTreeSet<String>>;

/// What to clean and what to keep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Remove data directories
    pub data: bool,
    /// Remove `*.log` files
    pub log: bool,
    /// Remove TLS certificates and keys
    pub tls: bool,
    /// Components whose files are kept
    pub retain_roles: Vec<String>,
    /// Instance IDs or hosts whose files are kept
    pub retain_nodes: Vec<String>,
}

impl CleanupOptions {
    /// Clean data, logs and TLS files
    pub fn all() -> Self {
        Self {
            data: true,
            log: true,
            tls: true,
            ..Default::default()
        }
    }

    /// True when nothing would be cleaned
    pub fn is_empty(&self) -> bool {
        !(self.data || self.log || self.tls)
    }
}

/// Compute the per-host paths to delete
///
/// Paths of colocated instances are merged, so each glob appears once per
/// host. The result does not depend on component or instance order.
pub fn cleanup_files(topo: &Topology, opts: &CleanupOptions) -> CleanupFiles {
    let mut files = CleanupFiles::new();
    instance_cleanup_files(topo, opts, &mut files);
    monitor_cleanup_files(topo, opts, &mut files);
    files
}

fn instance_cleanup_files(topo: &Topology, opts: &CleanupOptions, files: &mut CleanupFiles) {
    let retain_roles: HashSet<&str> = opts.retain_roles.iter().map(String::as_str).collect();
    let retain_nodes: HashSet<&str> = opts.retain_nodes.iter().map(String::as_str).collect();
    let tls_enabled = topo.global().enable_tls;

    for component in topo.components_by_stop_order() {
        for inst in &component.instances {
            let retained = retain_roles.contains(inst.component.as_str())
                || retain_nodes.contains(inst.id().as_str())
                || retain_nodes.contains(inst.host.as_str());
            if retained {
                continue;
            }

            let mut paths = BTreeSet::new();
            if opts.data {
                paths.extend(inst.data_dirs.iter().map(|dir| join_path(dir, "*")));
            }
            if opts.log {
                paths.extend(inst.log_dirs.iter().map(|dir| join_path(dir, "*.log")));
            }
            if opts.tls && !tls_enabled {
                paths.insert(join_path(&inst.deploy_dir, TLS_CERT_KEY_DIR));
            }

            if !paths.is_empty() {
                files.entry(inst.host.clone()).or_default().extend(paths);
            }
        }
    }
}

fn monitor_cleanup_files(topo: &Topology, opts: &CleanupOptions, files: &mut CleanupFiles) {
    let Some(monitored) = topo.monitored() else {
        return;
    };
    let user = &topo.global().user;
    let tls_enabled = topo.global().enable_tls;
    let (hosts, no_agent) = topo.monitored_hosts();

    for host in hosts.keys() {
        if no_agent.contains(host) || opts.retain_nodes.iter().any(|n| n == host) {
            continue;
        }

        let deploy_dir = abs_path(user, &monitored.deploy_dir);
        let mut paths = BTreeSet::new();

        if opts.data && !monitored.data_dir.is_empty() {
            // the default data_dir is relative to deploy_dir
            let data_dir = if monitored.data_dir.starts_with('/') {
                monitored.data_dir.clone()
            } else {
                join_path(&deploy_dir, &monitored.data_dir)
            };
            paths.insert(join_path(&data_dir, "*"));
        }

        let log_dir = abs_path(user, &monitored.log_dir);
        if opts.log && !monitored.log_dir.is_empty() {
            paths.insert(join_path(&log_dir, "*.log"));
        }

        if opts.tls && !tls_enabled {
            paths.insert(join_path(&deploy_dir, TLS_CERT_KEY_DIR));
        }

        if !paths.is_empty() {
            files.entry(host.clone()).or_default().extend(paths);
        }
    }
}

/// Removes the computed paths on every host
#[derive(Debug, Clone)]
pub struct CleanupStep {
    files: Arc<CleanupFiles>,
}

impl CleanupStep {
    /// Delete `files` when executed
    pub fn new(files: CleanupFiles) -> Self {
        Self {
            files: Arc::new(files),
        }
    }
}

#[async_trait]
impl Step for CleanupStep {
    async fn execute(&self, ctx: &Context) -> Result<()> {
        let hosts: Vec<(String, Vec<String>)> = self
            .files
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(host, paths)| (host.clone(), paths.iter().cloned().collect()))
            .collect();

        run_bounded(ctx, hosts, |ctx, (host, paths)| async move {
            let executor = ctx.executor(&host)?;
            tracing::info!("\tCleaning {} paths on {}", paths.len(), host);
            let quoted: Vec<String> = paths.iter().map(|p| shell_quote_glob(p)).collect();
            let command = format!("rm -rf {}", quoted.join(" "));
            executor.execute(&ctx, &command, true).await?;
            Ok(())
        })
        .await
    }
}

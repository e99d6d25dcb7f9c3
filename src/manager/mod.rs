//! Cluster manager
//!
//! The manager is the entry point of every operator command. It loads the
//! stored topology of a cluster, refuses to run while a scale-out/in is
//! unfinished, asks for confirmation before destructive work, opens one
//! executor per host and then builds and runs the pipeline.

pub mod cleanup;
pub mod confirm;
pub mod store;

pub use cleanup::{cleanup_files, CleanupFiles, CleanupOptions, CleanupStep};
pub use confirm::{AssumeYes, Confirmer, StdinConfirmer};
pub use store::ClusterStore;

use crate::config::ClusterConfig;
use crate::context::Context;
use crate::error::{ClusterError, Result};
use crate::executor::{Executor, SshConfig, SshExecutor};
use crate::operation::{append_steps, Operation, Options};
use crate::task::Builder;
use crate::topology::{HostInfo, Topology};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Opens the executor used to reach a host
pub trait ExecutorFactory: Send + Sync {
    fn create(&self, host: &str, info: &HostInfo, ssh: &SshConfig) -> Result<Arc<dyn Executor>>;
}

/// Reaches every host with the system `ssh` client
#[derive(Debug, Default, Clone, Copy)]
pub struct SshExecutorFactory;

impl ExecutorFactory for SshExecutorFactory {
    fn create(&self, host: &str, info: &HostInfo, ssh: &SshConfig) -> Result<Arc<dyn Executor>> {
        Ok(Arc::new(SshExecutor::new(host, info.ssh_port, ssh.clone())))
    }
}

/// Runs lifecycle and cleanup operations against stored clusters
pub struct Manager {
    config: ClusterConfig,
    store: ClusterStore,
    factory: Arc<dyn ExecutorFactory>,
    confirmer: Arc<dyn Confirmer>,
    cancel: CancellationToken,
}

impl Manager {
    /// Manager reaching hosts over SSH and prompting on the terminal
    pub fn new(config: ClusterConfig) -> Self {
        let store = ClusterStore::new(config.clusters_dir());
        Self {
            config,
            store,
            factory: Arc::new(SshExecutorFactory),
            confirmer: Arc::new(StdinConfirmer),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ExecutorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Cancelling `cancel` stops every running operation from issuing work
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    /// Start the cluster
    pub async fn start_cluster(&self, name: &str, opts: &Options) -> Result<()> {
        self.lifecycle(name, Operation::Start, opts).await
    }

    /// Stop the cluster
    pub async fn stop_cluster(&self, name: &str, opts: &Options) -> Result<()> {
        self.lifecycle(name, Operation::Stop, opts).await
    }

    /// Stop then start the cluster
    pub async fn restart_cluster(&self, name: &str, opts: &Options) -> Result<()> {
        self.lifecycle(name, Operation::Restart, opts).await
    }

    /// Enable or disable the cluster services at boot
    pub async fn enable_cluster(&self, name: &str, opts: &Options, enable: bool) -> Result<()> {
        let op = if enable {
            Operation::Enable
        } else {
            Operation::Disable
        };
        self.lifecycle(name, op, opts).await
    }

    async fn lifecycle(&self, name: &str, op: Operation, opts: &Options) -> Result<()> {
        let span = info_span!("operation", id = %Uuid::new_v4(), cluster = name, op = %op);

        async move {
            self.store.scale_locked_err(name)?;

            let topo = self.store.load(name)?;
            if let Err(e) = topo.validate() {
                warn!("Cluster {} metadata has problems: {}", name, e);
            }

            if op.is_destructive() && !opts.skip_confirm {
                self.confirm(format!(
                    "Will {} the cluster {} with nodes: {}, roles: {}.\nDo you want to continue?",
                    op,
                    name,
                    describe_filter(&opts.nodes),
                    describe_filter(&opts.roles),
                ))
                .await?;
            }

            let ctx = self.context(&topo, opts)?;
            let task = append_steps(Builder::new(), op, Arc::new(topo), opts).build();
            task.execute(&ctx).await?;

            info!("{} cluster `{}` successfully", past_tense(op), name);
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Stop the cluster and remove the selected files from every host
    pub async fn cleanup_cluster(
        &self,
        name: &str,
        opts: &Options,
        cleanup: &CleanupOptions,
    ) -> Result<()> {
        let span = info_span!("operation", id = %Uuid::new_v4(), cluster = name, op = "clean");

        async move {
            self.store.scale_locked_err(name)?;

            let topo = self.store.load(name)?;
            topo.validate()?;

            if cleanup.is_empty() {
                info!("Nothing to clean for cluster {}", name);
                return Ok(());
            }

            let files = cleanup_files(&topo, cleanup);
            if !opts.skip_confirm {
                let listing: Vec<String> = files
                    .iter()
                    .map(|(host, paths)| {
                        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
                        format!("{}: {}", host, paths.join(" "))
                    })
                    .collect();
                self.confirm(format!(
                    "This operation will stop cluster {} and clean the following files:\n{}\nDo you want to continue?",
                    name,
                    listing.join("\n"),
                ))
                .await?;
            }

            // the whole cluster is stopped, retained nodes included
            let stop_opts = Options {
                nodes: Vec::new(),
                roles: Vec::new(),
                ..opts.clone()
            };

            let ctx = self.context(&topo, opts)?;
            let task = append_steps(Builder::new(), Operation::Stop, Arc::new(topo), &stop_opts)
                .step("CleanupCluster", CleanupStep::new(files))
                .build();
            task.execute(&ctx).await?;

            info!("Cleanup cluster `{}` successfully", name);
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Ask the confirmer on a blocking thread, off the runtime workers
    async fn confirm(&self, prompt: String) -> Result<()> {
        let confirmer = self.confirmer.clone();
        tokio::task::spawn_blocking(move || confirmer.confirm(&prompt))
            .await
            .map_err(|e| ClusterError::Internal(format!("confirmation prompt failed: {}", e)))?
    }

    /// Context with one executor per host of `topo`
    fn context(&self, topo: &Topology, opts: &Options) -> Result<Context> {
        let ssh = SshConfig {
            user: topo.global().user.clone(),
            identity_file: self.config.ssh.identity_file.clone(),
            connect_timeout: opts.ssh_timeout,
        };

        let mut ctx = Context::new(opts.concurrency).with_cancel(self.cancel.child_token());
        for (host, info) in topo.hosts() {
            let executor = self.factory.create(&host, &info, &ssh)?;
            ctx = ctx.with_executor(&host, executor);
        }
        Ok(ctx)
    }
}

fn describe_filter(filter: &[String]) -> String {
    if filter.is_empty() {
        "all".to_string()
    } else {
        filter.join(",")
    }
}

fn past_tense(op: Operation) -> &'static str {
    match op {
        Operation::Start => "Started",
        Operation::Stop => "Stopped",
        Operation::Restart => "Restarted",
        Operation::Enable => "Enabled",
        Operation::Disable => "Disabled",
    }
}

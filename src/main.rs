//! Rune Cluster - lifecycle operations for multi-host service clusters
//!
//! This is the main CLI entry point for rune-cluster.

use clap::{Args, Parser, Subcommand};
use rune_cluster::config::ClusterConfig;
use rune_cluster::error::Result;
use rune_cluster::history;
use rune_cluster::manager::{CleanupOptions, Manager};
use rune_cluster::operation::Options;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Rune Cluster - operate multi-host service clusters
#[derive(Parser)]
#[command(name = "rune-cluster")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Start, stop, restart and clean multi-host service clusters", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every cluster operation
#[derive(Args)]
struct ClusterArgs {
    /// Cluster name
    cluster: String,
    /// Only operate on these nodes (host or host:port)
    #[arg(short = 'N', long = "node", value_delimiter = ',')]
    nodes: Vec<String>,
    /// Only operate on these roles
    #[arg(short = 'R', long = "role", value_delimiter = ',')]
    roles: Vec<String>,
    /// Maximum number of concurrent operations
    #[arg(short, long)]
    concurrency: Option<usize>,
    /// Seconds to wait for a port to change state
    #[arg(long)]
    wait_timeout: Option<u64>,
    /// Seconds allowed to establish an SSH connection
    #[arg(long)]
    ssh_timeout: Option<u64>,
    /// Wait until stopped instances have closed their port
    #[arg(long)]
    confirm_stopped: bool,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

impl ClusterArgs {
    fn options(&self, config: &ClusterConfig) -> Options {
        Options {
            concurrency: self.concurrency.unwrap_or(config.concurrency),
            nodes: self.nodes.clone(),
            roles: self.roles.clone(),
            skip_confirm: self.yes,
            op_timeout: self.wait_timeout.unwrap_or(config.op_timeout),
            ssh_timeout: self.ssh_timeout.unwrap_or(config.ssh.connect_timeout),
            confirm_stopped: self.confirm_stopped,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster
    Start(ClusterArgs),

    /// Stop a cluster
    Stop(ClusterArgs),

    /// Restart a cluster
    Restart(ClusterArgs),

    /// Start the cluster services at boot
    Enable(ClusterArgs),

    /// Do not start the cluster services at boot
    Disable(ClusterArgs),

    /// Stop a cluster and remove its data, logs or TLS files
    Clean {
        #[command(flatten)]
        target: ClusterArgs,
        /// Remove data directories
        #[arg(long)]
        data: bool,
        /// Remove log files
        #[arg(long)]
        log: bool,
        /// Remove TLS certificates and keys
        #[arg(long)]
        tls: bool,
        /// Remove data, logs and TLS files
        #[arg(long)]
        all: bool,
        /// Keep the files of these roles
        #[arg(long = "retain-role", value_delimiter = ',')]
        retain_roles: Vec<String>,
        /// Keep the files of these nodes (host or host:port)
        #[arg(long = "retain-node", value_delimiter = ',')]
        retain_nodes: Vec<String>,
    },

    /// Show recent commands
    #[command(args_conflicts_with_subcommands = true)]
    History {
        /// Number of entries to show, 0 for all
        #[arg(default_value = "15")]
        count: usize,

        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Delete history older than the retention period
    Prune {
        /// Days of history to keep
        #[arg(long, default_value = "60")]
        retain_days: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match ClusterConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for running operations to finish");
            on_signal.cancel();
        }
    });

    let args: Vec<String> = std::env::args().collect();
    let history_dir = config.history_dir();

    let code = match run(cli.command, config, cancel).await {
        Ok(()) => 0,
        Err(e) if e.is_user_abort() => {
            info!("{}", e);
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    };

    if let Err(e) = history::record(&history_dir, &args, chrono::Utc::now(), code) {
        warn!("Failed to record command history: {}", e);
    }

    std::process::exit(code);
}

async fn run(command: Commands, config: ClusterConfig, cancel: CancellationToken) -> Result<()> {
    match command {
        Commands::History { count, command } => {
            let dir = config.history_dir();
            match command {
                Some(HistoryCommands::Prune { retain_days }) => {
                    let removed = history::prune(&dir, retain_days, chrono::Utc::now())?;
                    println!("Removed {} history files", removed);
                }
                None => {
                    println!("{:<25} {:<6} COMMAND", "DATE", "CODE");
                    for row in history::recent(&dir, count)? {
                        println!(
                            "{:<25} {:<6} {}",
                            row.time.format("%Y-%m-%dT%H:%M:%S%z"),
                            row.code,
                            row.command
                        );
                    }
                }
            }
            Ok(())
        }

        Commands::Start(target) => {
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager.start_cluster(&target.cluster, &opts).await
        }

        Commands::Stop(target) => {
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager.stop_cluster(&target.cluster, &opts).await
        }

        Commands::Restart(target) => {
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager.restart_cluster(&target.cluster, &opts).await
        }

        Commands::Enable(target) => {
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager.enable_cluster(&target.cluster, &opts, true).await
        }

        Commands::Disable(target) => {
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager.enable_cluster(&target.cluster, &opts, false).await
        }

        Commands::Clean {
            target,
            data,
            log,
            tls,
            all,
            retain_roles,
            retain_nodes,
        } => {
            let cleanup = CleanupOptions {
                data: data || all,
                log: log || all,
                tls: tls || all,
                retain_roles,
                retain_nodes,
            };
            let opts = target.options(&config);
            let manager = Manager::new(config).with_cancel(cancel);
            manager
                .cleanup_cluster(&target.cluster, &opts, &cleanup)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str], config: &ClusterConfig) -> Options {
        match Cli::parse_from(args).command {
            Commands::Start(target) => target.options(config),
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_timeouts_fall_back_to_profile() {
        let mut config = ClusterConfig::default();
        config.ssh.connect_timeout = 11;
        config.op_timeout = 300;
        config.concurrency = 8;

        let opts = options(&["rune-cluster", "start", "prod"], &config);
        assert_eq!(opts.ssh_timeout, 11);
        assert_eq!(opts.op_timeout, 300);
        assert_eq!(opts.concurrency, 8);

        let opts = options(
            &[
                "rune-cluster",
                "start",
                "prod",
                "--ssh-timeout",
                "2",
                "--wait-timeout",
                "30",
                "-c",
                "3",
                "-N",
                "h1,h2:2379",
            ],
            &config,
        );
        assert_eq!(opts.ssh_timeout, 2);
        assert_eq!(opts.op_timeout, 30);
        assert_eq!(opts.concurrency, 3);
        assert_eq!(opts.nodes, vec!["h1", "h2:2379"]);
    }
}

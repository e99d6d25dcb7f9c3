//! Start, stop, restart, enable and disable

use super::service::{service_command, ServiceVerb};
use super::Options;
use crate::context::Context;
use crate::error::Result;
use crate::module::{PortState, WaitFor, WaitForConfig};
use crate::task::{run_bounded, Builder, Step, Task};
use crate::topology::{Component, Instance, OsKind, Topology};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Node exporter service name
pub const NODE_EXPORTER: &str = "node_exporter";

/// Blackbox exporter service name
pub const BLACKBOX_EXPORTER: &str = "blackbox_exporter";

/// A service unit on one host: an instance or a monitoring agent
#[derive(Debug, Clone)]
struct ServiceUnit {
    id: String,
    host: String,
    unit: String,
    port: u16,
    os: OsKind,
}

impl From<&Instance> for ServiceUnit {
    fn from(inst: &Instance) -> Self {
        Self {
            id: inst.id(),
            host: inst.host.clone(),
            unit: inst.service_name(),
            port: inst.port,
            os: inst.os,
        }
    }
}

/// Monitoring agent units selected by `opts`, one per agent per host
fn monitor_units(topo: &Topology, opts: &Options) -> Vec<ServiceUnit> {
    let Some(monitored) = topo.monitored() else {
        return Vec::new();
    };

    let (hosts, no_agent) = topo.monitored_hosts();
    let mut units = Vec::new();
    for (host, info) in hosts {
        if no_agent.contains(&host) || !opts.selects_agent_host(&host) {
            continue;
        }
        for (name, port) in [
            (NODE_EXPORTER, monitored.node_exporter_port),
            (BLACKBOX_EXPORTER, monitored.blackbox_exporter_port),
        ] {
            units.push(ServiceUnit {
                id: format!("{}:{}", host, port),
                host: host.clone(),
                unit: format!("{}-{}", name, port),
                port,
                os: info.os,
            });
        }
    }
    units
}

fn component_units(component: &Component, opts: &Options) -> Vec<ServiceUnit> {
    component
        .instances
        .iter()
        .filter(|inst| opts.selects(inst))
        .map(ServiceUnit::from)
        .collect()
}

async fn start_unit(ctx: &Context, unit: &ServiceUnit, opts: &Options) -> Result<()> {
    let executor = ctx.executor(&unit.host)?;
    info!("\tStarting instance {}", unit.id);

    let command = service_command(unit.os, ServiceVerb::Start, &unit.unit);
    executor.execute(ctx, &command, true).await?;

    WaitFor::new(WaitForConfig::new(unit.port, unit.os).timeout(opts.wait_timeout()))
        .execute(ctx, executor.as_ref())
        .await?;

    info!("\tStart instance {} success", unit.id);
    Ok(())
}

async fn stop_unit(ctx: &Context, unit: &ServiceUnit, opts: &Options) -> Result<()> {
    let executor = ctx.executor(&unit.host)?;
    info!("\tStopping instance {}", unit.id);

    let command = service_command(unit.os, ServiceVerb::Stop, &unit.unit);
    executor.execute(ctx, &command, true).await?;

    if opts.confirm_stopped {
        WaitFor::new(
            WaitForConfig::new(unit.port, unit.os)
                .state(PortState::Stopped)
                .timeout(opts.wait_timeout()),
        )
        .execute(ctx, executor.as_ref())
        .await?;
    }

    info!("\tStop instance {} success", unit.id);
    Ok(())
}

async fn toggle_unit(ctx: &Context, unit: &ServiceUnit, enable: bool) -> Result<()> {
    let executor = ctx.executor(&unit.host)?;
    let verb = if enable {
        ServiceVerb::Enable
    } else {
        ServiceVerb::Disable
    };
    info!("\t{} instance {}", verb, unit.id);

    let command = service_command(unit.os, verb, &unit.unit);
    executor.execute(ctx, &command, true).await?;
    Ok(())
}

/// Apply one action to every unit of a phase, within the concurrency budget
async fn run_phase(
    ctx: &Context,
    units: Vec<ServiceUnit>,
    action: ClusterAction,
    opts: &Options,
) -> Result<()> {
    let opts = opts.clone();
    run_bounded(ctx, units, move |ctx, unit| {
        let opts = opts.clone();
        async move {
            match action {
                ClusterAction::Start => start_unit(&ctx, &unit, &opts).await,
                ClusterAction::Stop => stop_unit(&ctx, &unit, &opts).await,
                ClusterAction::Enable => toggle_unit(&ctx, &unit, true).await,
                ClusterAction::Disable => toggle_unit(&ctx, &unit, false).await,
            }
        }
    })
    .await
}

/// Run `action` on every selected instance, component by component
async fn run_components(
    ctx: &Context,
    components: Vec<&Component>,
    action: ClusterAction,
    opts: &Options,
) -> Result<()> {
    for component in components {
        let units = component_units(component, opts);
        if units.is_empty() {
            continue;
        }
        info!("{} component {}", action.progress(), component.name);
        run_phase(ctx, units, action, opts).await?;
    }
    Ok(())
}

async fn run_monitors(
    ctx: &Context,
    topo: &Topology,
    action: ClusterAction,
    opts: &Options,
) -> Result<()> {
    let units = monitor_units(topo, opts);
    if units.is_empty() {
        return Ok(());
    }
    info!("{} monitoring agents", action.progress());
    run_phase(ctx, units, action, opts).await
}

/// Start selected instances in start order, then monitoring agents
pub async fn start(ctx: &Context, topo: &Topology, opts: &Options) -> Result<()> {
    run_components(ctx, topo.components_by_start_order(), ClusterAction::Start, opts).await?;
    run_monitors(ctx, topo, ClusterAction::Start, opts).await
}

/// Stop monitoring agents, then selected instances in stop order
pub async fn stop(ctx: &Context, topo: &Topology, opts: &Options) -> Result<()> {
    run_monitors(ctx, topo, ClusterAction::Stop, opts).await?;
    run_components(ctx, topo.components_by_stop_order(), ClusterAction::Stop, opts).await
}

/// Stop everything selected, then start it again
pub async fn restart(ctx: &Context, topo: &Topology, opts: &Options) -> Result<()> {
    stop(ctx, topo, opts).await?;
    start(ctx, topo, opts).await
}

/// Enable services in start order, or disable them in stop order
pub async fn enable(ctx: &Context, topo: &Topology, opts: &Options, enable: bool) -> Result<()> {
    if enable {
        run_components(ctx, topo.components_by_start_order(), ClusterAction::Enable, opts)
            .await?;
        run_monitors(ctx, topo, ClusterAction::Enable, opts).await
    } else {
        run_monitors(ctx, topo, ClusterAction::Disable, opts).await?;
        run_components(ctx, topo.components_by_stop_order(), ClusterAction::Disable, opts).await
    }
}

/// Action applied by a [`ClusterStep`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterAction {
    Start,
    Stop,
    Enable,
    Disable,
}

impl ClusterAction {
    fn progress(&self) -> &'static str {
        match self {
            ClusterAction::Start => "Starting",
            ClusterAction::Stop => "Stopping",
            ClusterAction::Enable => "Enabling",
            ClusterAction::Disable => "Disabling",
        }
    }
}

/// Pipeline step applying one action to a snapshot of the topology
#[derive(Debug, Clone)]
pub struct ClusterStep {
    action: ClusterAction,
    topology: Arc<Topology>,
    options: Options,
}

impl ClusterStep {
    /// Capture the inputs of the step
    pub fn new(action: ClusterAction, topology: Arc<Topology>, options: Options) -> Self {
        Self {
            action,
            topology,
            options,
        }
    }
}

#[async_trait]
impl Step for ClusterStep {
    async fn execute(&self, ctx: &Context) -> Result<()> {
        let topo = self.topology.as_ref();
        match self.action {
            ClusterAction::Start => start(ctx, topo, &self.options).await,
            ClusterAction::Stop => stop(ctx, topo, &self.options).await,
            ClusterAction::Enable => enable(ctx, topo, &self.options, true).await,
            ClusterAction::Disable => enable(ctx, topo, &self.options, false).await,
        }
    }
}

/// Operator intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl Operation {
    /// Whether the operation interrupts service and needs confirmation
    pub fn is_destructive(&self) -> bool {
        matches!(self, Operation::Stop | Operation::Restart)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Start => write!(f, "start"),
            Operation::Stop => write!(f, "stop"),
            Operation::Restart => write!(f, "restart"),
            Operation::Enable => write!(f, "enable"),
            Operation::Disable => write!(f, "disable"),
        }
    }
}

/// Append the steps of `op` to a builder
pub fn append_steps(
    builder: Builder,
    op: Operation,
    topology: Arc<Topology>,
    options: &Options,
) -> Builder {
    let step = |action| ClusterStep::new(action, topology.clone(), options.clone());
    match op {
        Operation::Start => builder.step("StartCluster", step(ClusterAction::Start)),
        Operation::Stop => builder.step("StopCluster", step(ClusterAction::Stop)),
        Operation::Restart => builder
            .step("StopCluster", step(ClusterAction::Stop))
            .step("StartCluster", step(ClusterAction::Start)),
        Operation::Enable => builder.step("EnableCluster", step(ClusterAction::Enable)),
        Operation::Disable => builder.step("DisableCluster", step(ClusterAction::Disable)),
    }
}

/// Pipeline for `op`; restart is a stop step followed by a start step
pub fn build_task(op: Operation, topology: Arc<Topology>, options: &Options) -> Task {
    append_steps(Builder::new(), op, topology, options).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{commands, new_log, CommandLog, MockExecutor};
    use crate::topology::TopologyParser;
    use std::time::Duration;

    const TWO_COMPONENTS: &str = r#"
components:
  - name: b
    depends_on: [a]
    instances:
      - host: h2
        port: 2000
  - name: a
    instances:
      - host: h1
        port: 1000
"#;

    const LISTENING: &str = "LISTEN 0 128 0.0.0.0:1000 0.0.0.0:*\n\
                             LISTEN 0 128 0.0.0.0:2000 0.0.0.0:*\n\
                             LISTEN 0 128 0.0.0.0:9100 0.0.0.0:*\n\
                             LISTEN 0 128 0.0.0.0:9115 0.0.0.0:*\n";

    fn context(log: &CommandLog, hosts: &[&str], stdout: &'static str) -> Context {
        hosts.iter().fold(Context::new(4), |ctx, host| {
            ctx.with_executor(host, Arc::new(MockExecutor::replying(host, log.clone(), stdout)))
        })
    }

    #[tokio::test]
    async fn test_start_then_stop_reverses_component_order() {
        let topo = TopologyParser::parse_str(TWO_COMPONENTS).unwrap();
        let opts = Options::default();

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], LISTENING);
        start(&ctx, &topo, &opts).await.unwrap();
        assert_eq!(
            commands(&log),
            vec![
                "systemctl daemon-reload && systemctl start a-1000.service",
                "ss -ltn",
                "systemctl daemon-reload && systemctl start b-2000.service",
                "ss -ltn",
            ]
        );

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], "");
        stop(&ctx, &topo, &opts).await.unwrap();
        assert_eq!(
            commands(&log),
            vec![
                "systemctl daemon-reload && systemctl stop b-2000.service",
                "systemctl daemon-reload && systemctl stop a-1000.service",
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_pipeline_is_stop_then_start() {
        let topo = Arc::new(TopologyParser::parse_str(TWO_COMPONENTS).unwrap());
        let task = build_task(Operation::Restart, topo, &Options::default());
        assert_eq!(task.step_names(), vec!["StopCluster", "StartCluster"]);

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], LISTENING);
        task.execute(&ctx).await.unwrap();

        let issued: Vec<String> = commands(&log)
            .into_iter()
            .filter(|c| c != "ss -ltn")
            .collect();
        assert_eq!(
            issued,
            vec![
                "systemctl daemon-reload && systemctl stop b-2000.service",
                "systemctl daemon-reload && systemctl stop a-1000.service",
                "systemctl daemon-reload && systemctl start a-1000.service",
                "systemctl daemon-reload && systemctl start b-2000.service",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_wait_blocks_later_components() {
        let topo = TopologyParser::parse_str(TWO_COMPONENTS).unwrap();
        let opts = Options {
            op_timeout: 3,
            ..Default::default()
        };

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], "State Recv-Q\n");
        let err = start(&ctx, &topo, &opts).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("port 1000"));
        assert!(commands(&log).iter().all(|c| !c.contains("b-2000")));
    }

    #[tokio::test]
    async fn test_role_filter() {
        let topo = TopologyParser::parse_str(TWO_COMPONENTS).unwrap();
        let opts = Options {
            roles: vec!["b".to_string()],
            ..Default::default()
        };

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], "");
        stop(&ctx, &topo, &opts).await.unwrap();
        assert_eq!(
            commands(&log),
            vec!["systemctl daemon-reload && systemctl stop b-2000.service"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_stopped_waits_for_closed_port() {
        let topo = TopologyParser::parse_str(TWO_COMPONENTS).unwrap();
        let opts = Options {
            confirm_stopped: true,
            roles: vec!["a".to_string()],
            ..Default::default()
        };

        let log = new_log();
        let ctx = context(&log, &["h1"], "State Recv-Q\n");
        stop(&ctx, &topo, &opts).await.unwrap();
        assert_eq!(
            commands(&log),
            vec![
                "systemctl daemon-reload && systemctl stop a-1000.service",
                "ss -ltn"
            ]
        );
    }

    #[tokio::test]
    async fn test_monitoring_agents_follow_components() {
        let yaml = r#"
monitored:
  node_exporter_port: 9100
  blackbox_exporter_port: 9115
components:
  - name: a
    instances:
      - host: h1
        port: 1000
      - host: h2
        port: 1000
        ignore_exporter: true
"#;
        let topo = TopologyParser::parse_str(yaml).unwrap();
        let opts = Options {
            concurrency: 1,
            ..Default::default()
        };

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], LISTENING);
        start(&ctx, &topo, &opts).await.unwrap();

        let log = log.lock().unwrap();
        let agent_hosts: Vec<&str> = log
            .iter()
            .filter(|(_, c)| c.contains("exporter"))
            .map(|(h, _)| h.as_str())
            .collect();
        assert_eq!(agent_hosts, vec!["h1", "h1"]);

        let last_instance = log.iter().rposition(|(_, c)| c.contains("a-1000")).unwrap();
        let first_agent = log.iter().position(|(_, c)| c.contains("exporter")).unwrap();
        assert!(last_instance < first_agent);
    }

    #[tokio::test]
    async fn test_disable_runs_in_stop_order() {
        let topo = Arc::new(TopologyParser::parse_str(TWO_COMPONENTS).unwrap());
        let task = build_task(Operation::Disable, topo, &Options::default());

        let log = new_log();
        let ctx = context(&log, &["h1", "h2"], "");
        task.execute(&ctx).await.unwrap();
        assert_eq!(
            commands(&log),
            vec![
                "systemctl daemon-reload && systemctl disable b-2000.service",
                "systemctl daemon-reload && systemctl disable a-1000.service",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_executor_fails_step() {
        let topo = Arc::new(TopologyParser::parse_str(TWO_COMPONENTS).unwrap());
        let task = build_task(Operation::Start, topo, &Options::default());

        let log = new_log();
        let ctx = context(&log, &["h2"], LISTENING);
        let err = task.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("StartCluster"));
    }

    #[test]
    fn test_wait_uses_op_timeout() {
        let opts = Options {
            op_timeout: 7,
            ..Default::default()
        };
        assert_eq!(opts.wait_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_destructive_operations() {
        assert!(Operation::Stop.is_destructive());
        assert!(Operation::Restart.is_destructive());
        assert!(!Operation::Start.is_destructive());
    }
}

//! nodeshiftd — the nodeshift disruption daemon.
//!
//! Loads a cluster snapshot, runs a drift evaluation pass over it, and
//! prints the resulting command. The periodic reconcile loop and the
//! execution of commands live elsewhere.
//!
//! # Usage
//!
//! ```text
//! nodeshiftd evaluate --snapshot demos/cluster.json --config demos/nodeshiftd.toml
//! ```

mod config;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nodeshift_disruption::{
    CandidateBuilder, ClusterSimulator, DisruptionBudgets, Drift, InFlightQueue, LogRecorder,
    PassContext, pass,
};
use nodeshift_state::{
    Clock, ClusterSnapshot, DisruptionReason, InMemoryCluster, Limits, SystemClock,
};

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "nodeshiftd", about = "nodeshift disruption daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one drift evaluation pass over a cluster snapshot.
    Evaluate {
        /// Cluster snapshot (JSON).
        #[arg(long)]
        snapshot: PathBuf,

        /// Daemon configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Abort the pass after this many seconds. Overrides the config.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Evaluate {
            snapshot,
            config,
            timeout_secs,
        } => {
            let config = match config {
                Some(path) => DaemonConfig::from_file(&path)?,
                None => DaemonConfig::default(),
            };
            init_tracing(&config)?;
            run_evaluate(snapshot, config, timeout_secs).await
        }
    }
}

fn init_tracing(config: &DaemonConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log.filter)?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run_evaluate(
    snapshot_path: PathBuf,
    config: DaemonConfig,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let snapshot = ClusterSnapshot::from_file(&snapshot_path)?;
    info!(
        path = ?snapshot_path,
        nodes = snapshot.nodes.len(),
        pods = snapshot.pods.len(),
        node_pools = snapshot.node_pools.len(),
        in_flight = snapshot.in_flight.len(),
        "cluster snapshot loaded"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut ctx = PassContext::new(shutdown_rx);
    if let Some(secs) = timeout_secs.or(config.evaluation.timeout_secs) {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    // ── Collaborators ──────────────────────────────────────────

    let cluster = InMemoryCluster::new(snapshot.clone());
    let queue = InFlightQueue::from_ids(snapshot.in_flight.iter().cloned());
    let recorder = Arc::new(LogRecorder);
    let clock = SystemClock;
    let pdbs = Limits::new(snapshot.pdbs.clone());
    let node_pools = snapshot.node_pool_map();
    let instance_types = snapshot.instance_type_map();

    let simulator = ClusterSimulator::new(
        Arc::new(cluster.clone()),
        snapshot.node_pools.clone(),
        snapshot.instance_types.clone(),
    )
    .with_options(config.packing_options());
    let drift = Drift::new(Arc::new(cluster.clone()), Arc::new(simulator), recorder.clone());

    let builder = CandidateBuilder {
        cluster: &cluster,
        recorder: recorder.as_ref(),
        clock: &clock,
        pdbs: &pdbs,
        queue: &queue,
        node_pools: &node_pools,
        instance_types: &instance_types,
    };
    let mut budgets = DisruptionBudgets::build(&snapshot.nodes, &snapshot.node_pools);

    // ── Evaluate ───────────────────────────────────────────────

    let evaluation = pass::evaluate(&ctx, &builder, &drift, &snapshot.nodes, &mut budgets).await?;

    let now = clock.now();
    let replacements: Vec<_> = evaluation
        .command
        .replacements()
        .iter()
        .enumerate()
        .map(|(i, template)| {
            template.to_node_claim(&format!("{}-replacement-{i}", template.node_pool), now)
        })
        .collect();
    let remaining: HashMap<&str, usize> = snapshot
        .node_pools
        .iter()
        .map(|np| {
            let left = budgets.remaining(&np.name, DisruptionReason::Drifted);
            (np.name.as_str(), left)
        })
        .collect();

    let output = serde_json::json!({
        "command": evaluation.command.log_values(),
        "message": evaluation.message(),
        "replacements": replacements,
        "drift_budget_remaining": remaining,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!(decision = %evaluation.command.decision(), "evaluation finished");
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{self, Duration};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use epidemic_sim::{EngineConfig, Simulation, Topology};

#[derive(Parser, Debug)]
#[command(name = "propagation-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology JSON file ({"nodes": [{"id"}], "links": [{"source", "target"}]}).
    #[arg(short, long, value_name = "FILE", conflicts_with = "ring")]
    topology: Option<PathBuf>,

    /// Generate a ring of N nodes instead of loading a file.
    #[arg(long, value_name = "N")]
    ring: Option<usize>,

    #[arg(short, long, default_value = "0")]
    start: usize,

    #[arg(long, default_value = "10")]
    ttl: u32,

    /// Requested fanout width (recorded; every peer is flooded).
    #[arg(short, long, default_value = "4")]
    fanout: usize,

    #[arg(long, default_value = "10")]
    delay_ms: u64,

    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    #[arg(long, default_value = "10000")]
    idle_timeout_ms: u64,

    /// Upper bound for the whole round.
    #[arg(long, default_value = "120")]
    round_timeout_secs: u64,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, default_value = "propagation.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    let topology = match (&args.topology, args.ring) {
        (Some(path), _) => Topology::from_file(path)?,
        (None, Some(n)) => Topology::ring(n),
        (None, None) => anyhow::bail!("either --topology or --ring is required"),
    };
    info!(
        nodes = topology.node_count(),
        links = topology.link_count(),
        "topology loaded"
    );

    let config = EngineConfig {
        fanout_width: args.fanout,
        propagation_delay: Duration::from_millis(args.delay_ms),
        delay_jitter: Duration::from_millis(args.jitter_ms),
        idle_timeout: Duration::from_millis(args.idle_timeout_ms),
        rng_seed: args.seed,
        ..Default::default()
    };

    let mut sim = Simulation::new(Arc::new(topology), config)?;

    let round = time::timeout(
        Duration::from_secs(args.round_timeout_secs),
        sim.start(args.start, args.ttl),
    )
    .await;
    let outcome = match round {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(anyhow::anyhow!(
            "propagation round did not finish within {}s",
            args.round_timeout_secs
        )),
    };
    if let Err(e) = sim.stop().await {
        warn!(error = %e, "failed to stop simulator");
    }
    outcome?;

    sim.write_output_to_file(&args.output)
        .context("failed to write propagation log")?;

    let stats = sim.stats()?;
    print!("{}", stats);

    Ok(())
}

//! # High-Level Simulation API
//!
//! A [`Simulation`] ties a topology to a simulator, runs one round, and
//! writes the resulting log for external reporting tools.
//!
//! ```ignore
//! let topology = Arc::new(Topology::from_file("network.json")?);
//! let mut sim = Simulation::new(topology, EngineConfig::default())?;
//! sim.start(0, 10).await?;
//! sim.stop().await?;
//! sim.write_output_to_file("propagation.json")?;
//! println!("{}", sim.stats()?);
//! ```

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::engine::{EngineConfig, PropagationEngine};
use crate::propagation::PropagationLog;
use crate::protocols::PropagationSimulator;
use crate::stats::{Stats, analyze};
use crate::topology::Topology;

pub struct Simulation {
    topology: Arc<Topology>,
    sim: Box<dyn PropagationSimulator>,
    log: Option<PropagationLog>,
}

impl Simulation {
    /// Spawn a [`PropagationEngine`] for `topology`.
    pub fn new(topology: Arc<Topology>, config: EngineConfig) -> Result<Self> {
        let engine = PropagationEngine::spawn(Arc::clone(&topology), config)
            .context("failed to construct propagation engine")?;
        Ok(Self::with_simulator(topology, Box::new(engine)))
    }

    /// Drive an arbitrary simulator over `topology`.
    pub fn with_simulator(topology: Arc<Topology>, sim: Box<dyn PropagationSimulator>) -> Self {
        Self { topology, sim, log: None }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Run one round from `start` and keep its log.
    pub async fn start(&mut self, start: usize, ttl: u32) -> Result<&PropagationLog> {
        let log = self
            .sim
            .send_message(start, ttl)
            .await
            .with_context(|| format!("propagation from node {} failed", start))?;
        info!(entries = log.len(), "simulation round recorded");
        Ok(self.log.insert(log))
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.sim.stop().await
    }

    pub fn log(&self) -> Option<&PropagationLog> {
        self.log.as_ref()
    }

    pub fn stats(&self) -> Result<Stats> {
        let log = self.log.as_ref().context("no propagation round has been run")?;
        Ok(analyze(&self.topology, log))
    }

    /// Write the log as JSON.
    pub fn write_output<W: Write>(&self, w: W) -> Result<()> {
        let log = self.log.as_ref().context("no propagation round has been run")?;
        serde_json::to_writer(w, log).context("encode propagation log")?;
        Ok(())
    }

    pub fn write_output_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let fd = fs::File::create(path)
            .with_context(|| format!("create output file {}", path.display()))?;
        let mut w = BufWriter::new(fd);
        self.write_output(&mut w)?;
        w.flush().context("flush output file")?;
        info!(path = %path.display(), "propagation log written");
        Ok(())
    }
}

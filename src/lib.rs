//! # Epidemic Propagation Simulator
//!
//! Simulates epidemic-style message propagation over an arbitrary topology
//! and measures the trace it leaves, without deploying real network nodes.
//!
//! - **Engine**: one tokio task per node, TTL-bounded flooding, per-node
//!   duplicate suppression, completion detection
//! - **Log**: timestamped hops plus per-millisecond link/node frames
//! - **Analysis**: per-node hit counts, node/link coverage, hit histogram
//!
//! ## Architecture
//!
//! The engine follows the **Actor Pattern**:
//! - Each node actor owns its dedup cache and inbound channel
//! - Actors share nothing mutable beyond a completion counter and a hop sink
//! - The engine handle owns the actors and assembles the log
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|--------|
//! | `topology` | Nodes, links, generators and JSON loading |
//! | `peers` | Adjacency precomputed from a topology |
//! | `messages` | Simulated message and hop report types |
//! | `engine` | Node actors and the propagation round |
//! | `propagation` | Propagation log assembly |
//! | `stats` | Hit counts and coverage |
//! | `histogram` | Geometric-bucket histogram |
//! | `protocols` | Simulator trait |
//! | `simulation` | Driver: run, stop, write output |
//! | `error` | Error types |

mod engine;
mod error;
mod histogram;
mod messages;
mod peers;
mod propagation;
mod protocols;
mod simulation;
mod stats;
mod topology;

pub use engine::{
    EngineConfig, PropagationEngine, DEFAULT_DEDUP_CACHE_SIZE, DEFAULT_FANOUT_WIDTH,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_PROPAGATION_DELAY,
};
pub use error::{HistogramError, SimError};
pub use histogram::{Histogram, HistogramBucket, HistogramOptions};
pub use messages::{HopEvent, Message, MessageId};
pub use peers::PeerTable;
pub use propagation::{LogEntry, PropagationLog};
pub use protocols::PropagationSimulator;
pub use simulation::Simulation;
pub use stats::{analyze, analyze_with, Coverage, Stats};
pub use topology::{Link, Topology};

//! Error types shared by the engine, the topology layer and the analyzer.
//!
//! Configuration errors are fatal and surface before any actor is spawned.
//! [`SimError::NoHopEvents`] is a runtime invariant violation: it aborts the
//! round instead of handing back a misleadingly empty log. Histogram range
//! errors are recoverable and only ever logged by the analyzer.

/// Structured error type for engine construction and propagation rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Topology is malformed (dangling link, duplicate or unknown node id).
    InvalidTopology(String),
    /// An `EngineConfig` field is out of range.
    InvalidConfig(&'static str),
    /// Start index does not name a node of the topology.
    StartOutOfRange { start: usize, node_count: usize },
    /// A seed message needs at least one hop of budget.
    ZeroTtl,
    /// Start node has peers but no hop was ever reported.
    NoHopEvents { start: usize, peers: usize },
    /// The single round this engine supports was already run.
    RoundConsumed,
    /// The start actor already hit its idle timeout before the seed arrived.
    ActorsExpired { start: usize },
    /// Actors could not be spawned (e.g. no tokio runtime available).
    ActorSetup(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTopology(reason) => write!(f, "invalid topology: {}", reason),
            Self::InvalidConfig(reason) => write!(f, "invalid engine configuration: {}", reason),
            Self::StartOutOfRange { start, node_count } => write!(
                f,
                "start node index {} out of range (topology has {} nodes)",
                start, node_count
            ),
            Self::ZeroTtl => write!(f, "ttl must be positive"),
            Self::NoHopEvents { start, peers } => write!(
                f,
                "no hop events observed although start node {} has {} peers",
                start, peers
            ),
            Self::RoundConsumed => write!(
                f,
                "propagation round already consumed; construct a new engine per round"
            ),
            Self::ActorsExpired { start } => write!(
                f,
                "actor for start node {} already terminated (idle timeout elapsed before the round)",
                start
            ),
            Self::ActorSetup(reason) => write!(f, "failed to spawn node actors: {}", reason),
        }
    }
}

impl std::error::Error for SimError {}

/// Rejection returned by [`crate::histogram::Histogram::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramError {
    /// Value is smaller than the configured minimum; it is not counted.
    BelowMinimum { value: i64, min: i64 },
}

impl std::fmt::Display for HistogramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowMinimum { value, min } => {
                write!(f, "no histogram bucket for {} (minimum is {})", value, min)
            }
        }
    }
}

impl std::error::Error for HistogramError {}

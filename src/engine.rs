//! # Concurrent Propagation Engine
//!
//! Every topology node is simulated by its own tokio task (a node actor).
//! Actors talk to each other only through per-node channels and report each
//! dispatched hop to a single sink drained by the engine.
//!
//! ## Actor Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | Message already in dedup cache | Dropped silently |
//! | New message, ttl left after decrement | Cached, then fanned out to all peers |
//! | New message, ttl exhausted | Cached, actor terminates |
//! | Seed via the origin path | Cached, fanned out without decrement |
//! | No traffic for `idle_timeout` | Actor terminates |
//!
//! A terminating actor decrements a shared completion counter. The round is
//! over when the counter reaches zero.
//!
//! ## Fanout
//!
//! Fanout is a full flood: every precomputed peer receives the message,
//! parallel links included. `fanout_width` is carried in the configuration
//! for callers that record it, but does not narrow the peer set.
//!
//! ## Limitations
//!
//! Actors live for exactly one flood. A second `send_message` on the same
//! engine fails with [`SimError::RoundConsumed`]. Idle timers start at
//! construction, so an engine left unused for longer than `idle_timeout`
//! has no actors left to propagate with.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lru::LruCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace};

use crate::error::SimError;
use crate::messages::{HopEvent, Message, MessageId};
use crate::peers::PeerTable;
use crate::propagation::{LogEntry, PropagationLog};
use crate::topology::Topology;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Quiescence window after which an actor with no traffic terminates.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulated per-fanout network latency.
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_millis(10);

/// Requested fanout width. Recorded only; see module docs.
pub const DEFAULT_FANOUT_WIDTH: usize = 4;

/// Dedup cache capacity per actor (message ids).
pub const DEFAULT_DEDUP_CACHE_SIZE: usize = 10_000;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Requested number of peers per fanout. Not applied: every peer is flooded.
    pub fanout_width: usize,
    /// Sleep before each fanout event (once per event, not per destination).
    pub propagation_delay: Duration,
    /// Upper bound of a uniformly random extra delay per fanout event.
    pub delay_jitter: Duration,
    /// Actor quiescence window. Must be positive.
    pub idle_timeout: Duration,
    /// Per-actor dedup cache capacity. Must be positive.
    pub dedup_cache_size: usize,
    /// Seed for the engine's generator. `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fanout_width: DEFAULT_FANOUT_WIDTH,
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
            delay_jitter: Duration::ZERO,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            dedup_cache_size: DEFAULT_DEDUP_CACHE_SIZE,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), SimError> {
        if self.idle_timeout.is_zero() {
            return Err(SimError::InvalidConfig("idle_timeout must be positive"));
        }
        if self.dedup_cache_size == 0 {
            return Err(SimError::InvalidConfig("dedup_cache_size must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Completion Detection
// ============================================================================

/// Countdown of live actors paired with a completion signal.
#[derive(Debug)]
struct CompletionCounter {
    remaining: AtomicUsize,
    done: Notify,
}

impl CompletionCounter {
    fn new(actors: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(actors),
            done: Notify::new(),
        }
    }

    fn finish(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_waiters();
        }
    }

    fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        loop {
            let notified = self.done.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent final finish() is not missed.
            notified.as_mut().enable();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts the owning actor out however its task ends (return, abort, panic).
struct ExitGuard(Arc<CompletionCounter>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

// ============================================================================
// Node Actor (owns its dedup cache)
// ============================================================================

/// Routing state shared read-only by all actors of one engine.
struct Wiring {
    peers: Arc<PeerTable>,
    inboxes: Vec<mpsc::UnboundedSender<Message>>,
    reports: mpsc::UnboundedSender<HopEvent>,
    delay: Duration,
    jitter: Duration,
}

struct NodeActor {
    index: usize,
    wiring: Arc<Wiring>,
    cache: LruCache<MessageId, ()>,
    rng: StdRng,
    idle_timeout: Duration,
    /// Nothing can ever reach a lone node, so it need not wait out its timer.
    sole_actor: bool,
    _exit: ExitGuard,
}

impl NodeActor {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Message>,
        mut origin: oneshot::Receiver<Message>,
    ) {
        let idle = sleep(self.idle_timeout);
        tokio::pin!(idle);
        let mut origin_open = true;

        loop {
            tokio::select! {
                seed = &mut origin, if origin_open => {
                    origin_open = false;
                    if let Ok(seed) = seed {
                        idle.as_mut().reset(Instant::now() + self.idle_timeout);
                        self.originate(seed).await;
                        if self.sole_actor {
                            debug!(node = self.index, "sole actor, nothing left to receive");
                            break;
                        }
                    }
                }
                received = inbox.recv() => {
                    let Some(message) = received else {
                        debug!(node = self.index, "inbox closed, actor quitting");
                        break;
                    };
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    if !self.handle(message).await {
                        break;
                    }
                }
                _ = &mut idle => {
                    debug!(node = self.index, "idle timeout, actor quitting");
                    break;
                }
            }
        }
    }

    /// Returns `false` once the actor should terminate.
    async fn handle(&mut self, mut message: Message) -> bool {
        if self.cache.contains(&message.id) {
            trace!(node = self.index, id = %message.id, "duplicate dropped");
            return true;
        }
        self.cache.put(message.id, ());

        message.ttl = message.ttl.saturating_sub(1);
        if message.ttl == 0 {
            debug!(node = self.index, id = %message.id, "hop budget exhausted");
            return false;
        }

        self.fanout(message).await;
        true
    }

    async fn originate(&mut self, seed: Message) {
        debug!(node = self.index, id = %seed.id, ttl = seed.ttl, "originating seed");
        self.cache.put(seed.id, ());
        self.fanout(seed).await;
    }

    async fn fanout(&mut self, message: Message) {
        let mut delay = self.wiring.delay;
        if !self.wiring.jitter.is_zero() {
            let max_us = u64::try_from(self.wiring.jitter.as_micros()).unwrap_or(u64::MAX);
            delay += Duration::from_micros(self.rng.gen_range(0..=max_us));
        }
        if !delay.is_zero() {
            sleep(delay).await;
        }

        for &peer in self.wiring.peers.peers_of(self.index) {
            // Report before delivery so a hop is always logged ahead of any
            // hop it causes.
            let event = HopEvent { at: Instant::now(), from: self.index, to: peer };
            let _ = self.wiring.reports.send(event);
            if self.wiring.inboxes[peer].send(message.clone()).is_err() {
                trace!(from = self.index, to = peer, "peer already terminated");
            }
        }
    }
}

// ============================================================================
// Propagation Engine (public API)
// ============================================================================

/// Owns the actors of one simulated network and runs a single flood round.
///
/// Dropping the engine aborts any actor still alive.
pub struct PropagationEngine {
    topology: Arc<Topology>,
    peers: Arc<PeerTable>,
    config: EngineConfig,
    origins: Vec<oneshot::Sender<Message>>,
    reports: Option<mpsc::UnboundedReceiver<HopEvent>>,
    completion: Arc<CompletionCounter>,
    actors: JoinSet<()>,
    seed_content: String,
}

impl PropagationEngine {
    /// Build the peer table and spawn one actor per node.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Configuration errors and missing runtime are reported before any actor
    /// is spawned.
    pub fn spawn(topology: Arc<Topology>, config: EngineConfig) -> Result<Self, SimError> {
        config.validate()?;
        let peers = Arc::new(PeerTable::build(&topology)?);
        let cache_cap = NonZeroUsize::new(config.dedup_cache_size)
            .ok_or(SimError::InvalidConfig("dedup_cache_size must be positive"))?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| SimError::ActorSetup(e.to_string()))?;

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seed_content = Message::seed_content(&mut rng);

        let node_count = topology.node_count();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let mut inboxes = Vec::with_capacity(node_count);
        let mut inbox_rxs = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let (tx, rx) = mpsc::unbounded_channel();
            inboxes.push(tx);
            inbox_rxs.push(rx);
        }

        let wiring = Arc::new(Wiring {
            peers: Arc::clone(&peers),
            inboxes,
            reports: report_tx,
            delay: config.propagation_delay,
            jitter: config.delay_jitter,
        });
        let completion = Arc::new(CompletionCounter::new(node_count));

        let mut origins = Vec::with_capacity(node_count);
        let mut actors = JoinSet::new();
        for (index, inbox) in inbox_rxs.into_iter().enumerate() {
            let (origin_tx, origin_rx) = oneshot::channel();
            origins.push(origin_tx);
            let actor = NodeActor {
                index,
                wiring: Arc::clone(&wiring),
                cache: LruCache::new(cache_cap),
                rng: StdRng::seed_from_u64(rng.r#gen()),
                idle_timeout: config.idle_timeout,
                sole_actor: node_count == 1,
                _exit: ExitGuard(Arc::clone(&completion)),
            };
            actors.spawn(actor.run(inbox, origin_rx));
        }

        debug!(
            nodes = node_count,
            links = topology.link_count(),
            fanout_width = config.fanout_width,
            "spawned node actors (full flood, fanout width not applied)"
        );

        Ok(Self {
            topology,
            peers,
            config,
            origins,
            reports: Some(report_rx),
            completion,
            actors,
            seed_content,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Actors that have not terminated yet.
    pub fn live_actors(&self) -> usize {
        self.completion.remaining()
    }

    /// Content marker of the seed this engine will inject.
    pub fn seed_content(&self) -> &str {
        &self.seed_content
    }

    /// Inject the seed at `start` and block until every actor has terminated.
    ///
    /// There is no overall timeout: wrap the call in `tokio::time::timeout`.
    pub async fn send_message(
        &mut self,
        start: usize,
        ttl: u32,
    ) -> Result<PropagationLog, SimError> {
        let node_count = self.topology.node_count();
        if start >= node_count {
            return Err(SimError::StartOutOfRange { start, node_count });
        }
        if ttl == 0 {
            return Err(SimError::ZeroTtl);
        }
        let mut reports = self.reports.take().ok_or(SimError::RoundConsumed)?;
        let mut origins = std::mem::take(&mut self.origins);
        if start >= origins.len() {
            // stop() already released the actors.
            return Err(SimError::ActorsExpired { start });
        }
        let origin = origins.swap_remove(start);
        // The other origin senders drop here; their actors keep running.
        drop(origins);

        let seed = Message::new(self.seed_content.clone(), ttl);
        info!(start, ttl, id = %seed.id, nodes = node_count, "sending seed message");
        let started = Instant::now();
        origin.send(seed).map_err(|_| SimError::ActorsExpired { start })?;

        let mut events = Vec::new();
        let completion = Arc::clone(&self.completion);
        let done = completion.wait();
        tokio::pin!(done);
        loop {
            tokio::select! {
                Some(event) = reports.recv() => events.push(event),
                _ = &mut done => break,
            }
        }
        // Actors report before they count themselves out, so every event is
        // buffered by now.
        while let Ok(event) = reports.try_recv() {
            events.push(event);
        }

        let peers = self.peers.degree(start);
        if events.is_empty() && peers > 0 {
            return Err(SimError::NoHopEvents { start, peers });
        }

        let entries = events
            .into_iter()
            .map(|e| LogEntry::new(e.at.saturating_duration_since(started), e.from, e.to))
            .collect();
        let log = PropagationLog::from_entries(&self.topology, entries);
        info!(
            entries = log.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "propagation round complete"
        );
        Ok(log)
    }

    /// Abort whatever actors are still alive and wait for them to unwind.
    /// Idempotent.
    pub async fn stop(&mut self) {
        self.origins.clear();
        if !self.actors.is_empty() {
            debug!(live = self.live_actors(), "stopping node actors");
        }
        self.actors.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            propagation_delay: Duration::from_millis(1),
            idle_timeout: Duration::from_millis(300),
            rng_seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn config_defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert!(config.dedup_cache_size > 0);
        assert!(config.delay_jitter.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let config = EngineConfig { idle_timeout: Duration::ZERO, ..Default::default() };
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        let result = PropagationEngine::spawn(Arc::new(Topology::ring(3)), fast_config());
        assert!(matches!(result, Err(SimError::ActorSetup(_))));
    }

    #[tokio::test]
    async fn completion_counter_wakes_waiter() {
        let counter = Arc::new(CompletionCounter::new(2));
        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.wait().await })
        };
        counter.finish();
        assert_eq!(counter.remaining(), 1);
        counter.finish();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn ring_flood_reaches_every_node() {
        let topo = Arc::new(Topology::ring(4));
        let mut engine = PropagationEngine::spawn(topo, fast_config()).unwrap();
        let log = engine.send_message(0, 3).await.unwrap();

        let reached: HashSet<usize> = log.entries.iter().map(|e| e.to).collect();
        assert_eq!(reached.len(), 4);
        assert_eq!(engine.live_actors(), 0);
        engine.stop().await;
    }

    #[tokio::test]
    async fn each_node_forwards_at_most_once() {
        let topo = Arc::new(Topology::full_mesh(5));
        let mut engine = PropagationEngine::spawn(topo, fast_config()).unwrap();
        let log = engine.send_message(2, 10).await.unwrap();

        let mut pairs = HashSet::new();
        for entry in &log.entries {
            assert!(pairs.insert((entry.from, entry.to)), "duplicate hop {:?}", entry);
        }
        // Every node floods its 4 peers exactly once.
        assert_eq!(log.len(), 5 * 4);
    }

    #[tokio::test]
    async fn second_round_is_refused() {
        let topo = Arc::new(Topology::line(2));
        let mut engine = PropagationEngine::spawn(topo, fast_config()).unwrap();
        engine.send_message(0, 1).await.unwrap();
        assert_eq!(engine.send_message(0, 1).await, Err(SimError::RoundConsumed));
        engine.stop().await;
        engine.stop().await;
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_the_round() {
        let topo = Arc::new(Topology::line(3));
        let mut engine = PropagationEngine::spawn(topo, fast_config()).unwrap();
        assert_eq!(
            engine.send_message(3, 2).await,
            Err(SimError::StartOutOfRange { start: 3, node_count: 3 })
        );
        assert_eq!(engine.send_message(0, 0).await, Err(SimError::ZeroTtl));
        // Arguments were checked before the round was consumed.
        assert!(engine.send_message(0, 2).await.is_ok());
    }

    #[tokio::test]
    async fn stop_releases_idle_actors() {
        let config = EngineConfig { idle_timeout: Duration::from_secs(60), ..fast_config() };
        let mut engine = PropagationEngine::spawn(Arc::new(Topology::ring(6)), config).unwrap();
        assert_eq!(engine.live_actors(), 6);
        engine.stop().await;
        assert_eq!(engine.live_actors(), 0);
    }

    #[tokio::test]
    async fn jitter_keeps_results_well_formed() {
        let config = EngineConfig { delay_jitter: Duration::from_millis(3), ..fast_config() };
        let mut engine = PropagationEngine::spawn(Arc::new(Topology::star(5)), config).unwrap();
        let log = engine.send_message(0, 2).await.unwrap();
        // Hub floods 4 spokes; each spoke sends back to the hub once.
        assert_eq!(log.len(), 8);
        assert!(log.entries.windows(2).all(|w| w[0].ts_us <= w[1].ts_us));
    }
}

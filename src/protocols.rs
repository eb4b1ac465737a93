//! Simulator trait definitions.
//!
//! The driver in [`crate::simulation`] only depends on this trait, so an
//! alternative propagation model can be plugged in without touching it.
//!
//! | Implementation | Model |
//! |----------------|-------|
//! | [`PropagationEngine`] | Actor-per-node TTL-bounded flood |

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::PropagationEngine;
use crate::propagation::PropagationLog;

/// One propagation round over a fixed topology.
#[async_trait]
pub trait PropagationSimulator: Send {
    /// Inject a message at `start` with hop budget `ttl` and return the
    /// hops observed until the simulated network went quiet.
    async fn send_message(&mut self, start: usize, ttl: u32) -> Result<PropagationLog>;

    /// Release simulator resources. Safe to call more than once.
    async fn stop(&mut self) -> Result<()>;
}

#[async_trait]
impl PropagationSimulator for PropagationEngine {
    async fn send_message(&mut self, start: usize, ttl: u32) -> Result<PropagationLog> {
        Ok(PropagationEngine::send_message(self, start, ttl).await?)
    }

    async fn stop(&mut self) -> Result<()> {
        PropagationEngine::stop(self).await;
        Ok(())
    }
}

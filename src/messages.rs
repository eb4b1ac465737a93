//! # Simulated Message Types
//!
//! Nothing here ever touches a socket. A [`Message`] is what node actors pass
//! to each other through their inbound channels; a [`HopEvent`] is what they
//! report to the engine's sink each time they dispatch one.
//!
//! ## Message IDs
//!
//! Messages are deduplicated by a 32-byte `MessageId` computed as
//! `blake3(content)`. Two messages with the same content are the same
//! message as far as every dedup cache is concerned, whatever their ttl.

use std::fmt;

use blake3::hash;
use rand::RngCore;
use tokio::time::Instant;

/// Length in bytes of the random marker embedded in seed content.
pub const SEED_MARKER_LEN: usize = 16;

/// Content-derived dedup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; 32]);

impl MessageId {
    pub fn for_content(content: &str) -> Self {
        Self(*hash(content.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// A propagating message: dedup key plus remaining hop budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub id: MessageId,
    /// Remaining hops. Decremented by the receiving actor only.
    pub ttl: u32,
}

impl Message {
    pub fn new(content: impl Into<String>, ttl: u32) -> Self {
        let content = content.into();
        let id = MessageId::for_content(&content);
        Self { content, id, ttl }
    }

    /// Content marker for a fresh seed, unique per generator draw.
    pub fn seed_content<R: RngCore>(rng: &mut R) -> String {
        let mut marker = [0u8; SEED_MARKER_LEN];
        rng.fill_bytes(&mut marker);
        format!("seed-{}", hex::encode(marker))
    }
}

/// Reported by an actor for every peer it dispatches a message to.
///
/// The report is made at send time, whether or not the receiver later drops
/// the message as a duplicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HopEvent {
    pub at: Instant,
    pub from: usize,
    pub to: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn message_id_is_deterministic() {
        let a = Message::new("dummy", 3);
        let b = Message::new("dummy", 1);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Message::new("other", 3).id);
        assert_eq!(a.id.as_bytes(), hash(b"dummy").as_bytes());
    }

    #[test]
    fn seed_content_depends_on_generator() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = Message::seed_content(&mut rng);
        let second = Message::seed_content(&mut rng);
        assert!(first.starts_with("seed-"));
        assert_eq!(first.len(), "seed-".len() + SEED_MARKER_LEN * 2);
        assert_ne!(first, second);

        let mut replay = StdRng::seed_from_u64(7);
        assert_eq!(Message::seed_content(&mut replay), first);
    }

    #[test]
    fn message_id_display_is_short_hex() {
        let id = MessageId::for_content("dummy");
        assert_eq!(id.to_string().len(), 16);
        assert!(format!("{:?}", id).starts_with("MessageId("));
    }
}

//! Propagation log: the artifact one round produces.
//!
//! Raw hop reports are kept as an ordered [`LogEntry`] list. For fast
//! coverage lookups and for replay by external visualizers the entries are
//! also grouped into frames, one per distinct millisecond, each listing the
//! link indices exercised and the node indices reached in that millisecond.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::topology::Topology;

/// One dispatched hop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Microseconds since the round started.
    pub ts_us: u64,
    pub from: usize,
    pub to: usize,
}

impl LogEntry {
    pub fn new(ts: Duration, from: usize, to: usize) -> Self {
        Self {
            ts_us: u64::try_from(ts.as_micros()).unwrap_or(u64::MAX),
            from,
            to,
        }
    }

    pub fn timestamp(&self) -> Duration {
        Duration::from_micros(self.ts_us)
    }
}

/// Ordered entries plus per-frame link and node index lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationLog {
    pub entries: Vec<LogEntry>,
    /// Frame timestamps in whole milliseconds, ascending.
    #[serde(rename = "ts")]
    pub timestamps: Vec<u64>,
    /// Link indices hit per frame.
    pub indices: Vec<Vec<usize>>,
    /// Receiving node indices per frame.
    pub nodes: Vec<Vec<usize>>,
}

impl PropagationLog {
    /// Sort `entries` by timestamp (stable for ties) and derive the frames.
    pub fn from_entries(topology: &Topology, mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|e| e.ts_us);

        let mut log = Self {
            entries: Vec::new(),
            timestamps: Vec::new(),
            indices: Vec::new(),
            nodes: Vec::new(),
        };

        for entry in &entries {
            let ms = entry.ts_us / 1000;
            if log.timestamps.last() != Some(&ms) {
                log.timestamps.push(ms);
                log.indices.push(Vec::new());
                log.nodes.push(Vec::new());
            }
            let frame = log.timestamps.len() - 1;

            match topology.link_index(entry.from, entry.to) {
                Some(link) => log.indices[frame].push(link),
                None => warn!(from = entry.from, to = entry.to, "hop over unknown link"),
            }
            log.nodes[frame].push(entry.to);
        }

        log.entries = entries;
        log
    }

    /// Fold another round into this log, keeping entry order by timestamp.
    pub fn merge(&mut self, topology: &Topology, other: PropagationLog) {
        let mut entries = std::mem::take(&mut self.entries);
        entries.extend(other.entries);
        *self = Self::from_entries(topology, entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Node indices reached, one item per hop.
    pub fn hit_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().flatten().copied()
    }

    /// Link indices exercised, one item per hop.
    pub fn hit_links(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().flatten().copied()
    }

    /// Time of the last recorded hop.
    pub fn duration(&self) -> Duration {
        self.entries.last().map(LogEntry::timestamp).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts_us: u64, from: usize, to: usize) -> LogEntry {
        LogEntry { ts_us, from, to }
    }

    #[test]
    fn entries_are_grouped_per_millisecond() {
        let topo = Topology::ring(4);
        let log = PropagationLog::from_entries(
            &topo,
            vec![
                entry(2_500, 1, 2),
                entry(100, 0, 1),
                entry(900, 0, 3),
                entry(2_100, 3, 2),
            ],
        );

        assert_eq!(log.len(), 4);
        assert_eq!(log.entries[0], entry(100, 0, 1));
        assert_eq!(log.timestamps, vec![0, 2]);
        assert_eq!(log.indices, vec![vec![0, 3], vec![2, 1]]);
        assert_eq!(log.nodes, vec![vec![1, 3], vec![2, 2]]);
        assert_eq!(log.duration(), Duration::from_micros(2_500));
    }

    #[test]
    fn empty_round_yields_empty_log() {
        let log = PropagationLog::from_entries(&Topology::isolated(2), Vec::new());
        assert!(log.is_empty());
        assert!(log.timestamps.is_empty());
        assert_eq!(log.hit_nodes().count(), 0);
        assert_eq!(log.duration(), Duration::ZERO);
    }

    #[test]
    fn merge_keeps_every_entry() {
        let topo = Topology::line(3);
        let mut log = PropagationLog::from_entries(&topo, vec![entry(10, 0, 1)]);
        let other = PropagationLog::from_entries(&topo, vec![entry(5, 1, 2), entry(3_000, 2, 1)]);
        log.merge(&topo, other);

        assert_eq!(log.len(), 3);
        assert_eq!(log.entries[0], entry(5, 1, 2));
        assert_eq!(log.hit_links().collect::<Vec<_>>(), vec![1, 0, 1]);
    }

    #[test]
    fn serializes_with_consumer_field_names() {
        let topo = Topology::line(2);
        let log = PropagationLog::from_entries(&topo, vec![entry(1_500, 0, 1)]);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["ts"], serde_json::json!([1]));
        assert_eq!(json["indices"], serde_json::json!([[0]]));
        assert_eq!(json["nodes"], serde_json::json!([[1]]));
        assert_eq!(json["entries"][0]["ts_us"], 1_500);
    }
}

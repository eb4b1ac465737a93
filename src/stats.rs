//! Trace analysis: hit counts, coverage and hit-count distribution.
//!
//! Hits are keyed by the topology's stable node identifier. Simulation
//! indices never leave this module, so stats from different runs over the
//! same graph compare directly.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::histogram::{Histogram, HistogramOptions};
use crate::propagation::PropagationLog;
use crate::topology::Topology;

/// `actual` out of `total` nodes or links touched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub actual: usize,
    pub total: usize,
}

impl Coverage {
    pub fn new(actual: usize, total: usize) -> Self {
        Self { actual, total }
    }

    /// Covered fraction in `0.0..=1.0`; an empty set counts as zero.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.actual as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.actual == self.total
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.0}%)", self.actual, self.total, self.ratio() * 100.0)
    }
}

/// Statistics derived from one propagation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Node identifier → number of hops that reached it.
    pub node_hits: BTreeMap<String, u64>,
    pub node_coverage: Coverage,
    pub link_coverage: Coverage,
    pub histogram: Histogram,
}

/// Analyze `log` with the default histogram options.
pub fn analyze(topology: &Topology, log: &PropagationLog) -> Stats {
    analyze_with(topology, log, HistogramOptions::default())
}

pub fn analyze_with(
    topology: &Topology,
    log: &PropagationLog,
    options: HistogramOptions,
) -> Stats {
    let node_hits = node_hits(topology, log);
    let histogram = hit_histogram(&node_hits, options);
    let node_coverage = Coverage::new(node_hits.len(), topology.node_count());
    let link_coverage = link_coverage(topology, log);

    debug!(
        entries = log.len(),
        nodes = %node_coverage,
        links = %link_coverage,
        "analyzed propagation log"
    );

    Stats { node_hits, node_coverage, link_coverage, histogram }
}

fn node_hits(topology: &Topology, log: &PropagationLog) -> BTreeMap<String, u64> {
    let mut hits = BTreeMap::new();
    for entry in &log.entries {
        match topology.node_id(entry.to) {
            Some(id) => *hits.entry(id.to_string()).or_insert(0) += 1,
            None => warn!(index = entry.to, "hop to node outside topology ignored"),
        }
    }
    hits
}

fn hit_histogram(node_hits: &BTreeMap<String, u64>, options: HistogramOptions) -> Histogram {
    let mut histogram = Histogram::new(options);
    for (node, &hits) in node_hits {
        let value = i64::try_from(hits).unwrap_or(i64::MAX);
        if let Err(e) = histogram.add(value) {
            warn!(node = %node, error = %e, "hit count skipped");
        }
    }
    histogram
}

fn link_coverage(topology: &Topology, log: &PropagationLog) -> Coverage {
    let hit: HashSet<usize> = log
        .hit_links()
        .filter(|&link| link < topology.link_count())
        .collect();
    Coverage::new(hit.len(), topology.link_count())
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats:")?;
        writeln!(f, "Nodes coverage: {}", self.node_coverage)?;
        writeln!(f, "Links coverage: {}", self.link_coverage)?;
        writeln!(f, "Node hits:")?;
        for (node, hits) in &self.node_hits {
            writeln!(f, "  {}: {}", node, hits)?;
        }
        writeln!(f, "Histogram:")?;
        write!(f, "{}", self.histogram)
    }
}

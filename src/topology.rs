//! Network topology: stable node identifiers and undirected links.
//!
//! Nodes are addressed two ways. The engine and the log use dense indices
//! `0..N-1`; anything that has to survive across runs (hit counts, reports)
//! uses the string identifier. A [`Topology`] is validated once at
//! construction and is read-only afterwards.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "nodes": [{ "id": "a" }, { "id": "b" }],
//!   "links": [{ "source": "a", "target": "b" }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// An undirected link between two node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: usize,
    pub to: usize,
}

impl Link {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Endpoints ordered low-high, so both traversal directions share a key.
    fn slot(&self) -> (usize, usize) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    nodes: Vec<GraphNode>,
    #[serde(default)]
    links: Vec<GraphLink>,
}

#[derive(Debug, Deserialize)]
struct GraphNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphLink {
    source: String,
    target: String,
}

/// Validated graph of nodes and undirected links.
#[derive(Debug, Clone)]
pub struct Topology {
    ids: Vec<String>,
    by_id: HashMap<String, usize>,
    links: Vec<Link>,
    /// First link index per unordered endpoint pair.
    slots: HashMap<(usize, usize), usize>,
}

impl Topology {
    /// Build a topology from ordered identifiers and index pairs.
    ///
    /// # Errors
    /// [`SimError::InvalidTopology`] on duplicate identifiers or on a link
    /// that references an index outside `0..ids.len()`.
    pub fn new(ids: Vec<String>, links: Vec<Link>) -> Result<Self, SimError> {
        let mut by_id = HashMap::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            if by_id.insert(id.clone(), idx).is_some() {
                return Err(SimError::InvalidTopology(format!("duplicate node id {:?}", id)));
            }
        }

        let mut slots = HashMap::with_capacity(links.len());
        for (idx, link) in links.iter().enumerate() {
            if link.from >= ids.len() || link.to >= ids.len() {
                return Err(SimError::InvalidTopology(format!(
                    "link {} ({} - {}) references a node outside 0..{}",
                    idx,
                    link.from,
                    link.to,
                    ids.len()
                )));
            }
            slots.entry(link.slot()).or_insert(idx);
        }

        Ok(Self { ids, by_id, links, slots })
    }

    /// Parse the JSON graph format described in the module docs.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: GraphFile = serde_json::from_str(json).context("malformed topology JSON")?;
        Self::from_graph_file(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let file: GraphFile =
            serde_json::from_reader(reader).context("malformed topology JSON")?;
        Self::from_graph_file(file)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fd = fs::File::open(path)
            .with_context(|| format!("open topology file {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(fd))
    }

    fn from_graph_file(file: GraphFile) -> Result<Self> {
        let ids: Vec<String> = file.nodes.into_iter().map(|n| n.id).collect();
        let lookup: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

        let mut links = Vec::with_capacity(file.links.len());
        for link in &file.links {
            let from = *lookup.get(link.source.as_str()).ok_or_else(|| {
                SimError::InvalidTopology(format!("link source {:?} is not a node", link.source))
            })?;
            let to = *lookup.get(link.target.as_str()).ok_or_else(|| {
                SimError::InvalidTopology(format!("link target {:?} is not a node", link.target))
            })?;
            links.push(Link::new(from, to));
        }

        Ok(Self::new(ids, links)?)
    }

    // ------------------------------------------------------------------------
    // Generators
    // ------------------------------------------------------------------------

    /// `n` nodes, each linked to its successor, last linked back to first.
    pub fn ring(n: usize) -> Self {
        let links = match n {
            0 | 1 => Vec::new(),
            2 => vec![Link::new(0, 1)],
            _ => (0..n).map(|i| Link::new(i, (i + 1) % n)).collect(),
        };
        Self::generated(n, links)
    }

    /// Chain of `n` nodes.
    pub fn line(n: usize) -> Self {
        let links = (1..n).map(|i| Link::new(i - 1, i)).collect();
        Self::generated(n, links)
    }

    /// Node 0 is the hub, every other node a spoke.
    pub fn star(n: usize) -> Self {
        let links = (1..n).map(|i| Link::new(0, i)).collect();
        Self::generated(n, links)
    }

    pub fn full_mesh(n: usize) -> Self {
        let mut links = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for a in 0..n {
            for b in (a + 1)..n {
                links.push(Link::new(a, b));
            }
        }
        Self::generated(n, links)
    }

    /// `n` nodes and no links.
    pub fn isolated(n: usize) -> Self {
        Self::generated(n, Vec::new())
    }

    fn generated(n: usize, links: Vec<Link>) -> Self {
        let ids = (0..n).map(|i| format!("n{}", i)).collect::<Vec<_>>();
        let by_id = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        let mut slots = HashMap::with_capacity(links.len());
        for (idx, link) in links.iter().enumerate() {
            slots.entry(link.slot()).or_insert(idx);
        }
        Self { ids, by_id, links, slots }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_id(&self, idx: usize) -> Option<&str> {
        self.ids.get(idx).map(String::as_str)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Index of the first link joining `a` and `b`, in either direction.
    pub fn link_index(&self, a: usize, b: usize) -> Option<usize> {
        self.slots.get(&Link::new(a, b).slot()).copied()
    }
}

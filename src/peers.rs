//! Precomputed adjacency used by the node actors.

use std::ops::Index;

use crate::error::SimError;
use crate::topology::Topology;

/// Node index → neighbor indices.
///
/// Symmetric for undirected links. Parallel links are kept as repeated
/// entries so redundant paths carry redundant traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerTable {
    peers: Vec<Vec<usize>>,
}

impl PeerTable {
    pub fn build(topology: &Topology) -> Result<Self, SimError> {
        let n = topology.node_count();
        let mut peers = vec![Vec::new(); n];
        for link in topology.links() {
            if link.from >= n || link.to >= n {
                return Err(SimError::InvalidTopology(format!(
                    "link {} - {} references a node outside 0..{}",
                    link.from, link.to, n
                )));
            }
            peers[link.from].push(link.to);
            peers[link.to].push(link.from);
        }
        Ok(Self { peers })
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peers_of(&self, node: usize) -> &[usize] {
        self.peers.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, node: usize) -> usize {
        self.peers_of(node).len()
    }
}

impl Index<usize> for PeerTable {
    type Output = [usize];

    fn index(&self, node: usize) -> &[usize] {
        &self.peers[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Link;

    #[test]
    fn adjacency_is_symmetric() {
        let table = PeerTable::build(&Topology::ring(4)).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(&table[0], &[1, 3]);
        assert_eq!(&table[1], &[0, 2]);
        assert_eq!(&table[3], &[2, 0]);
    }

    #[test]
    fn parallel_links_are_not_deduplicated() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let topo = Topology::new(ids, vec![Link::new(0, 1), Link::new(0, 1)]).unwrap();
        let table = PeerTable::build(&topo).unwrap();
        assert_eq!(table.peers_of(0), &[1, 1]);
        assert_eq!(table.peers_of(1), &[0, 0]);
    }

    #[test]
    fn isolated_nodes_have_no_peers() {
        let table = PeerTable::build(&Topology::isolated(2)).unwrap();
        assert_eq!(table.degree(0), 0);
        assert_eq!(table.degree(1), 0);
        assert!(table.peers_of(9).is_empty());
    }
}

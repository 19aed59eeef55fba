//! Static topology of a fully connected simulation network.

use ricart_types::{DelayRange, EdgeKey, NodeId};
use std::collections::BTreeMap;

/// The node set and every edge's delay range.
///
/// The graph is always complete: every unordered pair of distinct nodes has
/// exactly one edge. Ranges are stored normalized (`min <= max`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    num_nodes: u32,
    edges: BTreeMap<EdgeKey, DelayRange>,
}

impl Topology {
    /// Build the complete graph on `num_nodes` nodes.
    ///
    /// Pairs present in `delays` use that range; every other pair uses
    /// `default_range`. Entries for edges outside the graph are ignored.
    pub fn complete(
        num_nodes: u32,
        delays: &BTreeMap<EdgeKey, DelayRange>,
        default_range: DelayRange,
    ) -> Self {
        let edges = EdgeKey::complete_graph(num_nodes)
            .map(|edge| {
                let range = delays.get(&edge).copied().unwrap_or(default_range);
                (edge, range.normalized())
            })
            .collect();
        Self { num_nodes, edges }
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    /// Check if a node exists.
    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.num_nodes
    }

    /// All node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.num_nodes).map(NodeId)
    }

    /// Every node except `node`, in ascending order.
    pub fn peers_of(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.nodes().filter(move |n| *n != node)
    }

    /// Delay range of the edge between `a` and `b`.
    ///
    /// Returns `None` for a self-pair or a node outside the graph.
    pub fn delay_range(&self, a: NodeId, b: NodeId) -> Option<DelayRange> {
        EdgeKey::new(a, b).and_then(|edge| self.edges.get(&edge).copied())
    }

    /// All edges with their ranges, in key order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, DelayRange)> + '_ {
        self.edges.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of edges (`n * (n - 1) / 2`).
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

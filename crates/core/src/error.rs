//! Error types.

use ricart_types::{EdgeKey, NodeId, VirtualTime};
use thiserror::Error;

/// A simulation configuration that cannot be accepted.
///
/// These are only raised at construction time. Once a simulation exists it
/// never fails; anomalies during a run are logged and recorded in history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The simulation needs at least one node.
    #[error("number of nodes must be at least 1")]
    NoNodes,

    /// A map refers to a node outside `0..num_nodes`.
    #[error("{context} refers to node {node} but only {num_nodes} nodes exist")]
    UnknownNode {
        /// Which part of the configuration contained the reference.
        context: &'static str,
        /// The offending node.
        node: NodeId,
        /// Configured node count.
        num_nodes: u32,
    },

    /// An edge delay range with `min > max`.
    #[error("edge {edge} has invalid delay range min={min}, max={max} (require min <= max)")]
    InvalidDelay {
        /// The edge.
        edge: EdgeKey,
        /// Configured minimum.
        min: VirtualTime,
        /// Configured maximum.
        max: VirtualTime,
    },
}

/// Errors from the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No events remain.
    #[error("event queue is empty")]
    Empty,
}

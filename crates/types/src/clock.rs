//! Lamport clocks and request timestamps.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-node Lamport logical clock.
///
/// The value never decreases. Local events advance it by one; receiving a
/// message sets it to `max(local, received) + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LamportClock(u64);

impl LamportClock {
    /// A clock at zero.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Current value without advancing.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Advance the clock and return the new value.
    ///
    /// With `Some(received)` this is a receive event, otherwise a local event.
    pub fn tick(&mut self, received: Option<u64>) -> u64 {
        self.0 = match received {
            Some(received) => self.0.max(received).saturating_add(1),
            None => self.0.saturating_add(1),
        };
        self.0
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority key attached to a REQUEST.
///
/// Ordered lexicographically by clock then node id, which makes it a total
/// order: two distinct nodes can never hold equal timestamps. Smaller means
/// higher priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RequestTimestamp {
    /// Lamport clock value at the moment of the request.
    pub clock: u64,
    /// Requesting node, used as the tie-break.
    pub node: NodeId,
}

impl RequestTimestamp {
    /// Create a new request timestamp.
    pub fn new(clock: u64, node: NodeId) -> Self {
        Self { clock, node }
    }

    /// Whether this request wins a conflict against `other`.
    pub fn has_priority_over(&self, other: &RequestTimestamp) -> bool {
        self < other
    }
}

impl fmt::Display for RequestTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.clock, self.node.0)
    }
}

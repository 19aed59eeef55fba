//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Node identifier.
///
/// Nodes are numbered densely from `0` to `num_nodes - 1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into per-node vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

/// Unordered pair of distinct nodes identifying an edge.
///
/// Always stored with `low < high`, so `EdgeKey::new(a, b) == EdgeKey::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    /// Create an edge key from two endpoints in either order.
    ///
    /// Returns `None` for a self-loop.
    pub fn new(a: NodeId, b: NodeId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The smaller endpoint.
    pub fn low(&self) -> NodeId {
        self.low
    }

    /// The larger endpoint.
    pub fn high(&self) -> NodeId {
        self.high
    }

    /// Iterate every edge of the complete graph on `num_nodes` nodes,
    /// in `(low, high)` lexicographic order.
    pub fn complete_graph(num_nodes: u32) -> impl Iterator<Item = EdgeKey> {
        (0..num_nodes).flat_map(move |u| {
            (u + 1..num_nodes).map(move |v| EdgeKey {
                low: NodeId(u),
                high: NodeId(v),
            })
        })
    }
}

/// `"u,v"` with `u < v`, the interchange form used in configuration files.
impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.low.0, self.high.0)
    }
}

/// Errors parsing an edge key string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeKeyParseError {
    /// The string did not contain exactly two comma-separated parts.
    #[error("edge key '{0}' must have two parts separated by a comma")]
    WrongArity(String),

    /// One of the parts was not a node number.
    #[error("edge key '{key}' has a non-numeric part '{part}'")]
    NotANumber {
        /// The offending key.
        key: String,
        /// The part that failed to parse.
        part: String,
    },

    /// Both endpoints were the same node.
    #[error("edge key '{0}' connects a node to itself")]
    SelfLoop(String),
}

impl FromStr for EdgeKey {
    type Err = EdgeKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(EdgeKeyParseError::WrongArity(s.to_string()));
        }

        let parse_part = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map(NodeId)
                .map_err(|_| EdgeKeyParseError::NotANumber {
                    key: s.to_string(),
                    part: part.trim().to_string(),
                })
        };

        let a = parse_part(parts[0])?;
        let b = parse_part(parts[1])?;
        EdgeKey::new(a, b).ok_or_else(|| EdgeKeyParseError::SelfLoop(s.to_string()))
    }
}

impl Serialize for EdgeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EdgeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Node and message enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutual-exclusion state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// Not interested in the critical section.
    #[default]
    Idle,
    /// Requested the critical section, waiting for replies.
    Wanted,
    /// Inside the critical section.
    Held,
}

impl NodeState {
    /// Upper-case name, as shown in logs and tables.
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::Idle => "IDLE",
            NodeState::Wanted => "WANTED",
            NodeState::Held => "HELD",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two protocol messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Permission request carrying a request timestamp.
    Request,
    /// Permission grant.
    Reply,
}

impl MessageKind {
    /// Upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Reply => "REPLY",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

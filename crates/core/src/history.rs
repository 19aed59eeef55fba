//! Append-only audit log of simulation transitions.
//!
//! Every entry carries a snapshot of *all* nodes, so any prefix of the log is
//! enough to render the node table as it was at that point without replaying
//! the simulation.

use ricart_types::{NodeId, NodeState, RequestTimestamp, VirtualTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of transition a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    /// Simulation constructed.
    #[serde(rename = "INIT")]
    Init,
    /// A message was delivered and processed.
    #[serde(rename = "MSG_ARRIVE")]
    MessageArrival,
    /// A node entered the critical section.
    #[serde(rename = "CS_ENTER")]
    CsEnter,
    /// A node left the critical section.
    #[serde(rename = "CS_EXIT")]
    CsExit,
    /// A preconfigured request fired.
    #[serde(rename = "SCHED_REQ")]
    ScheduledRequest,
    /// A caller asked a node to request the critical section.
    #[serde(rename = "MANUAL_REQ")]
    ManualRequest,
    /// Time was advanced by the caller.
    #[serde(rename = "TIME_ADV")]
    TimeAdvance,
    /// A protocol anomaly that was tolerated.
    #[serde(rename = "ERROR")]
    Error,
    /// An event that could not be attributed to any node.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl HistoryKind {
    /// Short label used in logs and tables.
    pub fn label(&self) -> &'static str {
        match self {
            HistoryKind::Init => "INIT",
            HistoryKind::MessageArrival => "MSG_ARRIVE",
            HistoryKind::CsEnter => "CS_ENTER",
            HistoryKind::CsExit => "CS_EXIT",
            HistoryKind::ScheduledRequest => "SCHED_REQ",
            HistoryKind::ManualRequest => "MANUAL_REQ",
            HistoryKind::TimeAdvance => "TIME_ADV",
            HistoryKind::Error => "ERROR",
            HistoryKind::Unknown => "UNKNOWN",
        }
    }

    /// Whether this entry records something going wrong.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, HistoryKind::Error | HistoryKind::Unknown)
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The observable state of one node at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Which node.
    pub node: NodeId,
    /// Its state.
    pub state: NodeState,
    /// Its Lamport clock value.
    pub clock: u64,
    /// Its current request, if any.
    pub request_ts: Option<RequestTimestamp>,
}

/// One immutable history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Virtual time of the transition.
    pub time: VirtualTime,
    /// Transition kind.
    pub kind: HistoryKind,
    /// Free-form human-readable description.
    pub details: String,
    /// Nodes the transition is about.
    pub involved: Vec<NodeId>,
    /// Every node's state after the transition, ordered by node id.
    pub snapshot: Vec<NodeSnapshot>,
}

impl HistoryEntry {
    /// Snapshot of a single node, if it exists.
    pub fn node(&self, node: NodeId) -> Option<&NodeSnapshot> {
        self.snapshot.get(node.index())
    }

    /// Nodes that were HELD in this snapshot.
    pub fn holders(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.snapshot
            .iter()
            .filter(|s| s.state == NodeState::Held)
            .map(|s| s.node)
    }
}

/// Append-only sequence of [`HistoryEntry`] values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Past entries are never modified.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by position.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Iterate entries, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    /// Entries appended at or after position `index`.
    ///
    /// Lets a log view append only what is new since it last rendered.
    pub fn entries_since(&self, index: usize) -> &[HistoryEntry] {
        &self.entries[index.min(self.entries.len())..]
    }

    /// The last entry recorded at or before `time`.
    pub fn latest_at(&self, time: VirtualTime) -> Option<&HistoryEntry> {
        // Times are non-decreasing, so the entries at or before `time` form a prefix.
        let end = self.entries.partition_point(|e| e.time <= time);
        end.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Entries of a given kind.
    pub fn of_kind(&self, kind: HistoryKind) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter().filter(move |e| e.kind == kind)
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

//! Per-node Ricart-Agrawala state machine.
//!
//! ```text
//! IDLE ──begin_request──▶ WANTED ──(last reply)──▶ HELD ──exit_cs──▶ IDLE
//! ```
//!
//! The node only holds state and answers local questions (should this request
//! be deferred, was this reply expected). Scheduling and message sending are
//! done by the protocol handler in [`crate::Simulation`].

use indexmap::IndexSet;
use ricart_core::NodeSnapshot;
use ricart_types::{LamportClock, NodeId, NodeState, RequestTimestamp, VirtualTime};
use std::collections::BTreeSet;

/// What to do with an incoming REQUEST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    /// Grant permission now.
    Reply,
    /// Queue the sender until this node leaves the critical section.
    Defer,
}

/// Result of recording an incoming REPLY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was awaited; `remaining` replies are still outstanding.
    Accepted {
        /// Replies still awaited.
        remaining: usize,
    },
    /// The node is WANTED but was not waiting on this sender.
    Unexpected,
    /// The node is not WANTED, so no reply was awaited at all.
    NotWanted,
}

/// One simulated process.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    cs_duration: VirtualTime,
    state: NodeState,
    clock: LamportClock,
    request_ts: Option<RequestTimestamp>,
    /// Peers whose REPLY is still awaited. Non-empty only while WANTED.
    outstanding_replies: BTreeSet<NodeId>,
    /// Senders of postponed REQUESTs, in arrival order.
    deferred: IndexSet<NodeId>,
}

impl Node {
    /// Create an idle node with its clock at zero.
    pub fn new(id: NodeId, cs_duration: VirtualTime) -> Self {
        Self {
            id,
            cs_duration,
            state: NodeState::Idle,
            clock: LamportClock::new(),
            request_ts: None,
            outstanding_replies: BTreeSet::new(),
            deferred: IndexSet::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Time spent HELD once entered.
    pub fn cs_duration(&self) -> VirtualTime {
        self.cs_duration
    }

    /// Current state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Current Lamport clock value.
    pub fn clock(&self) -> u64 {
        self.clock.value()
    }

    /// Timestamp of the current request, if WANTED or HELD.
    pub fn request_ts(&self) -> Option<RequestTimestamp> {
        self.request_ts
    }

    /// Peers whose REPLY is still awaited.
    pub fn outstanding_replies(&self) -> &BTreeSet<NodeId> {
        &self.outstanding_replies
    }

    /// Deferred requesters in the order they will be answered.
    pub fn deferred_queue(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.deferred.iter().copied()
    }

    /// Number of deferred requesters.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Snapshot for the history log.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node: self.id,
            state: self.state,
            clock: self.clock.value(),
            request_ts: self.request_ts,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transitions (driven by the protocol handler)
    // ═══════════════════════════════════════════════════════════════════════

    /// Advance the Lamport clock; see [`LamportClock::tick`].
    pub(crate) fn tick(&mut self, received: Option<u64>) -> u64 {
        self.clock.tick(received)
    }

    /// IDLE → WANTED. Caller must have checked the state.
    ///
    /// Ticks the clock, stamps the request and starts waiting on `peers`.
    pub(crate) fn begin_request(&mut self, peers: BTreeSet<NodeId>) -> RequestTimestamp {
        debug_assert_eq!(self.state, NodeState::Idle);
        let clock = self.clock.tick(None);
        let ts = RequestTimestamp::new(clock, self.id);
        self.state = NodeState::Wanted;
        self.request_ts = Some(ts);
        self.outstanding_replies = peers;
        self.deferred.clear();
        ts
    }

    /// The priority rule for an incoming REQUEST.
    ///
    /// A request without a timestamp never wins against our own request.
    pub fn decide(&self, sender_ts: Option<RequestTimestamp>) -> RequestDecision {
        match self.state {
            NodeState::Held => RequestDecision::Defer,
            NodeState::Idle => RequestDecision::Reply,
            NodeState::Wanted => match (sender_ts, self.request_ts) {
                (Some(theirs), Some(ours)) if theirs.has_priority_over(&ours) => {
                    RequestDecision::Reply
                }
                // WANTED without an own timestamp cannot happen, so granting is harmless
                (Some(_), None) => RequestDecision::Reply,
                _ => RequestDecision::Defer,
            },
        }
    }

    /// Add `sender` to the deferred queue.
    ///
    /// Returns `false` if it was already queued.
    pub(crate) fn defer(&mut self, sender: NodeId) -> bool {
        self.deferred.insert(sender)
    }

    /// Record a REPLY from `sender`.
    pub(crate) fn record_reply(&mut self, sender: NodeId) -> ReplyOutcome {
        if self.state != NodeState::Wanted {
            return ReplyOutcome::NotWanted;
        }
        if self.outstanding_replies.remove(&sender) {
            ReplyOutcome::Accepted {
                remaining: self.outstanding_replies.len(),
            }
        } else {
            ReplyOutcome::Unexpected
        }
    }

    /// → HELD.
    ///
    /// Returns `false` if the node was not WANTED with every reply in; the
    /// transition still happens and any outstanding replies are discarded.
    pub(crate) fn enter_cs(&mut self) -> bool {
        let valid = self.state == NodeState::Wanted && self.outstanding_replies.is_empty();
        self.outstanding_replies.clear();
        self.state = NodeState::Held;
        valid
    }

    /// HELD → IDLE.
    ///
    /// Returns the drained deferred queue, or `None` (and changes nothing) if
    /// the node was not HELD.
    pub(crate) fn exit_cs(&mut self) -> Option<Vec<NodeId>> {
        if self.state != NodeState::Held {
            return None;
        }
        self.state = NodeState::Idle;
        self.request_ts = None;
        Some(self.deferred.drain(..).collect())
    }
}

//! Event types for the discrete-event scheduler.

use crate::Message;
use ricart_types::{NodeId, VirtualTime};
use std::fmt;

/// Everything that can be queued for later dispatch.
///
/// Events are **passive data** - they describe something that will happen.
/// The protocol handler interprets them when they are popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A REQUEST or REPLY reaches its receiver.
    MessageArrival(Message),

    /// A node has collected every reply and may enter the critical section.
    CsEnter {
        /// The entering node.
        node: NodeId,
    },

    /// A node's critical-section duration has elapsed.
    CsExit {
        /// The exiting node.
        node: NodeId,
    },

    /// A preconfigured request to enter the critical section.
    ScheduledRequest {
        /// The requesting node.
        node: NodeId,
    },
}

impl EventKind {
    /// The node whose state this event acts on.
    pub fn target_node(&self) -> NodeId {
        match self {
            EventKind::MessageArrival(message) => message.receiver,
            EventKind::CsEnter { node }
            | EventKind::CsExit { node }
            | EventKind::ScheduledRequest { node } => *node,
        }
    }

    /// Short label, matching the history log labels.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::MessageArrival(_) => "MSG_ARRIVE",
            EventKind::CsEnter { .. } => "CS_ENTER",
            EventKind::CsExit { .. } => "CS_EXIT",
            EventKind::ScheduledRequest { .. } => "SCHED_REQ",
        }
    }

    /// Whether processing this event changes who may hold the critical section.
    ///
    /// Message arrivals are bookkeeping; everything else is a milestone worth
    /// stopping at when stepping interactively.
    pub fn is_significant(&self) -> bool {
        !matches!(self, EventKind::MessageArrival(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::MessageArrival(message) => write!(f, "MSG_ARRIVE {message}"),
            other => write!(f, "{} {}", other.type_name(), other.target_node()),
        }
    }
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Virtual time at which the event fires.
    pub time: VirtualTime,
    /// Enqueue order; breaks ties between events with equal `time`.
    pub sequence: u64,
    /// What happens.
    pub kind: EventKind,
}

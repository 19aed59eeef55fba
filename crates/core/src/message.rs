//! Protocol messages and in-flight records.

use ricart_types::{EdgeKey, MessageKind, NodeId, RequestTimestamp, VirtualTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A protocol message travelling between two nodes.
///
/// This is the payload of a message-arrival event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// REQUEST or REPLY.
    pub kind: MessageKind,
    /// Sending node.
    pub sender: NodeId,
    /// Receiving node.
    pub receiver: NodeId,
    /// Sender's Lamport clock when the message was sent.
    pub msg_clock: u64,
    /// Priority key; present on REQUEST only.
    pub request_ts: Option<RequestTimestamp>,
}

impl Message {
    /// A REQUEST carrying `request_ts`.
    pub fn request(sender: NodeId, receiver: NodeId, request_ts: RequestTimestamp) -> Self {
        Self {
            kind: MessageKind::Request,
            sender,
            receiver,
            msg_clock: request_ts.clock,
            request_ts: Some(request_ts),
        }
    }

    /// A REPLY stamped with the sender's clock.
    pub fn reply(sender: NodeId, receiver: NodeId, msg_clock: u64) -> Self {
        Self {
            kind: MessageKind::Reply,
            sender,
            receiver,
            msg_clock,
            request_ts: None,
        }
    }

    /// The edge this message travels over.
    ///
    /// `None` only for a self-addressed message, which is never sent.
    pub fn edge(&self) -> Option<EdgeKey> {
        EdgeKey::new(self.sender, self.receiver)
    }

    /// Check if this is a REQUEST.
    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}->{} clock={}",
            self.kind, self.sender, self.receiver, self.msg_clock
        )?;
        if let Some(ts) = self.request_ts {
            write!(f, " ts={ts}")?;
        }
        Ok(())
    }
}

/// Observability record of a message that has been sent but not yet delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitMessage {
    /// REQUEST or REPLY.
    pub kind: MessageKind,
    /// Sending node.
    pub sender: NodeId,
    /// Receiving node.
    pub receiver: NodeId,
    /// Virtual time the message left the sender.
    pub send_time: VirtualTime,
    /// Virtual time the message will arrive.
    pub arrival_time: VirtualTime,
}

impl TransitMessage {
    /// Whether this record describes the delivery of `message` at `arrival_time`.
    pub fn matches(&self, message: &Message, arrival_time: VirtualTime) -> bool {
        self.kind == message.kind
            && self.sender == message.sender
            && self.receiver == message.receiver
            && self.arrival_time == arrival_time
    }

    /// Fraction of the trip completed at `now`, in `[0.0, 1.0]`.
    ///
    /// Intended for renderers that animate messages along edges.
    pub fn progress(&self, now: VirtualTime) -> f64 {
        let total = self.arrival_time.saturating_sub(self.send_time);
        if total == 0 {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.send_time).min(total);
        elapsed as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_timestamp_clock() {
        let ts = RequestTimestamp::new(4, NodeId(1));
        let msg = Message::request(NodeId(1), NodeId(2), ts);
        assert!(msg.is_request());
        assert_eq!(msg.msg_clock, 4);
        assert_eq!(msg.request_ts, Some(ts));
        assert_eq!(msg.edge(), EdgeKey::new(NodeId(2), NodeId(1)));
    }

    #[test]
    fn test_transit_match_and_progress() {
        let msg = Message::reply(NodeId(0), NodeId(1), 3);
        let transit = TransitMessage {
            kind: MessageKind::Reply,
            sender: NodeId(0),
            receiver: NodeId(1),
            send_time: 10,
            arrival_time: 20,
        };
        assert!(transit.matches(&msg, 20));
        assert!(!transit.matches(&msg, 21));
        assert!(!transit.matches(&Message::reply(NodeId(1), NodeId(0), 3), 20));

        assert_eq!(transit.progress(10), 0.0);
        assert_eq!(transit.progress(15), 0.5);
        assert_eq!(transit.progress(99), 1.0);
    }
}

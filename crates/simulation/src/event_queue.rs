//! Event queue with deterministic ordering.

use ricart_core::{Event, EventKind, QueueError};
use ricart_types::VirtualTime;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (FIFO for same time)
///
/// There is deliberately no priority or node-index level: equal-time events
/// must dispatch in exactly the order they were submitted.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: VirtualTime,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, EventKind>,
    /// Last sequence number handed out.
    sequence: u64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `kind` at absolute time `at`.
    ///
    /// A time earlier than `now` is moved forward to `now` with a warning;
    /// the event is never dropped. Returns the key the event was stored under.
    pub fn schedule(&mut self, at: VirtualTime, now: VirtualTime, kind: EventKind) -> EventKey {
        let time = if at < now {
            warn!(
                requested = at,
                now,
                event = kind.type_name(),
                "Attempted to schedule event in the past, scheduling at current time instead"
            );
            now
        } else {
            at
        };

        self.sequence += 1;
        let key = EventKey {
            time,
            sequence: self.sequence,
        };
        self.events.insert(key, kind);
        key
    }

    /// Remove and return the earliest event.
    pub fn pop_next(&mut self) -> Result<Event, QueueError> {
        let (key, kind) = self.events.pop_first().ok_or(QueueError::Empty)?;
        Ok(Event {
            time: key.time,
            sequence: key.sequence,
            kind,
        })
    }

    /// The earliest event without removing it.
    pub fn peek(&self) -> Option<(EventKey, &EventKind)> {
        self.events.first_key_value().map(|(k, v)| (*k, v))
    }

    /// Time of the earliest event.
    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.events.first_key_value().map(|(k, _)| k.time)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pending events in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (EventKey, &EventKind)> + '_ {
        self.events.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricart_types::NodeId;
    use tracing_test::traced_test;

    fn exit(node: u32) -> EventKind {
        EventKind::CsExit { node: NodeId(node) }
    }

    #[test]
    fn test_event_key_ordering() {
        let earlier = EventKey {
            time: 1,
            sequence: 9,
        };
        let later = EventKey {
            time: 2,
            sequence: 1,
        };
        assert!(earlier < later);
    }

    #[test]
    fn test_same_time_is_fifo() {
        let mut queue = EventQueue::new();
        queue.schedule(5, 0, exit(2));
        queue.schedule(5, 0, exit(0));
        queue.schedule(3, 0, exit(1));

        let order: Vec<NodeId> = std::iter::from_fn(|| queue.pop_next().ok())
            .map(|e| e.kind.target_node())
            .collect();
        assert_eq!(order, vec![NodeId(1), NodeId(2), NodeId(0)]);
    }

    #[test]
    fn test_sequence_strictly_increasing() {
        let mut queue = EventQueue::new();
        let a = queue.schedule(10, 0, exit(0));
        let b = queue.schedule(1, 0, exit(0));
        assert!(b.sequence > a.sequence);
    }

    #[traced_test]
    #[test]
    fn test_past_time_is_clamped_not_dropped() {
        let mut queue = EventQueue::new();
        let key = queue.schedule(3, 10, exit(0));
        assert_eq!(key.time, 10);
        assert_eq!(queue.len(), 1);
        assert!(logs_contain("in the past"));
    }

    #[test]
    fn test_pop_empty() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.pop_next(), Err(QueueError::Empty));
        assert!(queue.peek_time().is_none());
    }
}

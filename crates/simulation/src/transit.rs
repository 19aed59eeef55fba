//! In-flight message tracking.
//!
//! Purely observational: renderers use it to draw messages on edges and tests
//! use it to count traffic. Protocol correctness never depends on it.

use ricart_core::{Message, TransitMessage};
use ricart_types::{EdgeKey, VirtualTime};
use std::collections::BTreeMap;

/// In-flight messages grouped by edge, in send order.
#[derive(Debug, Default)]
pub struct InTransitTracker {
    by_edge: BTreeMap<EdgeKey, Vec<TransitMessage>>,
}

impl InTransitTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message leaving its sender.
    pub fn record(&mut self, edge: EdgeKey, entry: TransitMessage) {
        self.by_edge.entry(edge).or_default().push(entry);
    }

    /// Remove the record of `message` arriving at `arrival_time`.
    ///
    /// Returns the removed record, or `None` if no record matched.
    pub fn complete(
        &mut self,
        edge: EdgeKey,
        message: &Message,
        arrival_time: VirtualTime,
    ) -> Option<TransitMessage> {
        let list = self.by_edge.get_mut(&edge)?;
        let idx = list.iter().position(|t| t.matches(message, arrival_time))?;
        let removed = list.remove(idx);
        if list.is_empty() {
            self.by_edge.remove(&edge);
        }
        Some(removed)
    }

    /// Messages currently travelling over `edge`.
    pub fn on_edge(&self, edge: EdgeKey) -> &[TransitMessage] {
        self.by_edge.get(&edge).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every in-flight message, grouped by edge in key order.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeKey, &TransitMessage)> + '_ {
        self.by_edge
            .iter()
            .flat_map(|(edge, list)| list.iter().map(move |t| (*edge, t)))
    }

    /// Total in-flight messages.
    pub fn len(&self) -> usize {
        self.by_edge.values().map(Vec::len).sum()
    }

    /// Check if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.by_edge.is_empty()
    }
}

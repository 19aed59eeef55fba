//! Deterministic simulation runner.
//!
//! [`Simulation`] is the facade: it owns every piece of mutable state, pops
//! events in `(time, sequence)` order and hands them to the protocol handler
//! (see `protocol.rs`). Given the same configuration and delay source it
//! produces the same history every run.

use crate::event_queue::EventQueue;
use crate::network::{DelaySource, SeededDelaySource, SimulatedNetwork};
use crate::transit::InTransitTracker;
use crate::{Node, Observer, SimulationConfig};
use ricart_core::{
    ConfigError, Event, EventKind, History, HistoryEntry, HistoryKind, Topology, TransitMessage,
};
use ricart_types::{EdgeKey, NodeId, NodeState, VirtualTime};
use tracing::{debug, error, info, info_span, trace, warn, Span};

/// Step bound used by [`Simulation::step_until_significant`] callers that have
/// no better limit.
pub const DEFAULT_STEP_LIMIT: usize = 10_000;

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Requests that moved a node from IDLE to WANTED.
    pub requests_initiated: u64,
    /// REQUEST messages sent.
    pub requests_sent: u64,
    /// REPLY messages sent.
    pub replies_sent: u64,
    /// REQUESTs that were deferred.
    pub deferrals: u64,
    /// Critical-section entries.
    pub cs_entries: u64,
    /// Critical-section exits.
    pub cs_exits: u64,
    /// Tolerated protocol anomalies (unexpected replies, duplicate deferrals, ...).
    pub anomalies: u64,
    /// Events whose requested time was in the past and got moved forward.
    pub clamped_schedules: u64,
}

impl SimulationStats {
    /// Total messages sent.
    pub fn messages_sent(&self) -> u64 {
        self.requests_sent + self.replies_sent
    }
}

/// Why [`Simulation::step_until_significant`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A CS entry/exit, scheduled request or anomaly was processed.
    Significant {
        /// Events processed, including the significant one.
        steps: usize,
    },
    /// The queue ran dry first.
    QueueEmpty {
        /// Events processed.
        steps: usize,
    },
    /// The step bound was reached.
    LimitReached {
        /// Events processed.
        steps: usize,
    },
}

impl StepOutcome {
    /// Events processed before stopping.
    pub fn steps(&self) -> usize {
        match self {
            StepOutcome::Significant { steps }
            | StepOutcome::QueueEmpty { steps }
            | StepOutcome::LimitReached { steps } => *steps,
        }
    }
}

/// Builder for a [`Simulation`] with injected collaborators.
pub struct SimulationBuilder {
    config: SimulationConfig,
    delay_source: Option<Box<dyn DelaySource>>,
    observer: Option<Box<dyn Observer>>,
    span: Option<Span>,
}

impl SimulationBuilder {
    /// Draw message delays from `source` instead of a generator seeded from
    /// the configuration.
    pub fn with_delay_source(mut self, source: impl DelaySource + 'static) -> Self {
        self.delay_source = Some(Box::new(source));
        self
    }

    /// Notify `observer` after every mutating operation.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Log everything under `span` instead of a fresh `simulation` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Validate the configuration and construct the simulation.
    ///
    /// Scheduled requests are queued, an INIT history entry is recorded and
    /// the observer is notified once.
    pub fn build(self) -> Result<Simulation, ConfigError> {
        self.config.validate()?;
        let config = self.config;

        let span = self.span.unwrap_or_else(|| {
            info_span!("simulation", seed = config.seed, num_nodes = config.num_nodes)
        });
        let _guard = span.clone().entered();

        let topology =
            Topology::complete(config.num_nodes, &config.edge_delays, config.default_delay);
        let nodes: Vec<Node> = topology
            .nodes()
            .map(|id| Node::new(id, config.cs_duration_for(id)))
            .collect();
        let source = self
            .delay_source
            .unwrap_or_else(|| Box::new(SeededDelaySource::new(config.seed)));

        let mut sim = Simulation {
            nodes,
            queue: EventQueue::new(),
            now: 0,
            network: SimulatedNetwork::new(topology, source),
            in_transit: InTransitTracker::new(),
            history: History::new(),
            observer: self.observer,
            stats: SimulationStats::default(),
            span: span.clone(),
        };

        for (&node, times) in &config.scheduled_requests {
            for &at in times {
                debug!(%node, at, "Scheduling request");
                sim.schedule_at(at, EventKind::ScheduledRequest { node });
            }
        }

        sim.record(
            HistoryKind::Init,
            format!("Initialized {} nodes.", config.num_nodes),
            vec![],
        );

        info!(
            num_nodes = config.num_nodes,
            scheduled_requests = sim.queue.len(),
            seed = config.seed,
            "Created simulation"
        );

        sim.notify();
        Ok(sim)
    }
}

/// Deterministic Ricart-Agrawala simulation.
///
/// Single-threaded: every public operation runs to completion before it
/// returns, and "concurrency" between nodes is the interleaving of events
/// from the one global queue.
pub struct Simulation {
    /// All nodes, indexed by `NodeId`.
    pub(crate) nodes: Vec<Node>,

    /// Global event queue, ordered by time then sequence.
    pub(crate) queue: EventQueue,

    /// Current simulation time. Never decreases.
    pub(crate) now: VirtualTime,

    /// Topology and delay sampling.
    pub(crate) network: SimulatedNetwork,

    /// Messages sent but not yet delivered.
    pub(crate) in_transit: InTransitTracker,

    /// Append-only audit log.
    pub(crate) history: History,

    /// Visualization hook.
    observer: Option<Box<dyn Observer>>,

    /// Statistics.
    pub(crate) stats: SimulationStats,

    /// Every log line of this simulation is emitted under this span.
    span: Span,
}

impl Simulation {
    /// Create a simulation with the seeded default delay source.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Start building a simulation with injected collaborators.
    pub fn builder(config: SimulationConfig) -> SimulationBuilder {
        SimulationBuilder {
            config,
            delay_source: None,
            observer: None,
            span: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Read-only accessors
    // ═══════════════════════════════════════════════════════════════════════

    /// Get current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> u32 {
        self.network.topology().num_nodes()
    }

    /// Get a reference to a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// The node table, indexed by node id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes currently in the critical section. Never more than one.
    pub fn holders(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.state() == NodeState::Held)
            .map(Node::id)
    }

    /// The static topology.
    pub fn topology(&self) -> &Topology {
        self.network.topology()
    }

    /// The audit log.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Messages currently travelling over `edge`, in send order.
    pub fn in_transit(&self, edge: EdgeKey) -> &[TransitMessage] {
        self.in_transit.on_edge(edge)
    }

    /// Every in-flight message.
    pub fn messages_in_transit(&self) -> impl Iterator<Item = &TransitMessage> + '_ {
        self.in_transit.iter().map(|(_, t)| t)
    }

    /// Number of queued events.
    pub fn pending_event_count(&self) -> usize {
        self.queue.len()
    }

    /// Time of the next queued event.
    pub fn next_event_time(&self) -> Option<VirtualTime> {
        self.queue.peek_time()
    }

    /// Copies of all queued events in dispatch order.
    pub fn pending_events(&self) -> Vec<Event> {
        self.queue
            .iter()
            .map(|(key, kind)| Event {
                time: key.time,
                sequence: key.sequence,
                kind: kind.clone(),
            })
            .collect()
    }

    /// Get simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════════════════

    /// Ask `node` to request the critical section now.
    ///
    /// Returns `false` (and changes nothing) unless the node exists and is
    /// IDLE. Either way a MANUAL_REQUEST entry is recorded.
    pub fn want_cs(&mut self, node: NodeId) -> bool {
        let _guard = self.span.clone().entered();

        let initiated = self.request_cs(node);
        let outcome = if initiated {
            "(Initiated)"
        } else {
            "(Failed - Not IDLE)"
        };
        self.record(
            HistoryKind::ManualRequest,
            format!("Node {} manual request. {}", node.0, outcome),
            vec![node],
        );
        self.notify();
        initiated
    }

    /// Queue a request for `node` at absolute time `at`.
    ///
    /// A time in the past fires at the current time instead. Returns `false`
    /// if the node does not exist.
    pub fn schedule_request(&mut self, node: NodeId, at: VirtualTime) -> bool {
        let _guard = self.span.clone().entered();

        if !self.topology().contains(node) {
            warn!(%node, at, "Cannot schedule request for unknown node");
            return false;
        }
        self.schedule_at(at, EventKind::ScheduledRequest { node });
        true
    }

    /// Process exactly one event.
    ///
    /// Returns `false` only if the queue was already empty.
    pub fn step(&mut self) -> bool {
        let _guard = self.span.clone().entered();
        self.step_inner()
    }

    /// Process every event due within the next `amount` time units, then move
    /// the clock to `now + amount` even if the queue emptied earlier.
    ///
    /// Records one TIME_ADVANCE entry. Returns `false` for `amount == 0`.
    pub fn advance_by(&mut self, amount: VirtualTime) -> bool {
        let _guard = self.span.clone().entered();

        if amount == 0 {
            warn!("Advance time amount must be a positive integer");
            return false;
        }

        let initial = self.now;
        let target = initial.saturating_add(amount);
        let mut processed = 0u64;

        debug!(from = initial, to = target, "Advancing time");

        while let Some(time) = self.queue.peek_time() {
            if time > target || !self.step_inner() {
                break;
            }
            processed += 1;
        }

        if self.now < target {
            self.now = target;
        }

        self.record(
            HistoryKind::TimeAdvance,
            format!(
                "Advanced time from T={} to T={} (processed {} events).",
                initial, self.now, processed
            ),
            vec![],
        );
        self.notify();
        true
    }

    /// Advance by a single time unit.
    pub fn advance_one(&mut self) -> bool {
        self.advance_by(1)
    }

    /// Step until something significant has been processed: a CS entry or
    /// exit, a scheduled request, or any event that produced an ERROR/UNKNOWN
    /// entry. Message arrivals in between are processed silently.
    pub fn step_until_significant(&mut self, max_steps: usize) -> StepOutcome {
        let _guard = self.span.clone().entered();

        let mut steps = 0;
        while steps < max_steps {
            let Some((_, next)) = self.queue.peek() else {
                return StepOutcome::QueueEmpty { steps };
            };
            let significant = next.is_significant();
            let history_before = self.history.len();

            if !self.step_inner() {
                return StepOutcome::QueueEmpty { steps };
            }
            steps += 1;

            let anomaly = self
                .history
                .entries_since(history_before)
                .iter()
                .any(|e| e.kind.is_anomaly());
            if significant || anomaly {
                return StepOutcome::Significant { steps };
            }
        }

        if self.queue.is_empty() {
            StepOutcome::QueueEmpty { steps }
        } else {
            warn!(max_steps, "Step limit reached without a significant event");
            StepOutcome::LimitReached { steps }
        }
    }

    /// Step until the queue is empty or `max_events` have been processed.
    ///
    /// Returns the number of events processed.
    pub fn run_to_quiescence(&mut self, max_events: usize) -> usize {
        let _guard = self.span.clone().entered();

        let mut processed = 0;
        while processed < max_events && self.step_inner() {
            processed += 1;
        }
        if !self.queue.is_empty() {
            warn!(
                max_events,
                remaining_events = self.queue.len(),
                "Event limit reached before the queue emptied"
            );
        }
        processed
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals shared with the protocol handler
    // ═══════════════════════════════════════════════════════════════════════

    fn step_inner(&mut self) -> bool {
        let Ok(event) = self.queue.pop_next() else {
            debug!("Event queue empty, no step taken");
            return false;
        };

        if event.time < self.now {
            // The queue clamps on insert, so this indicates a scheduler bug.
            error!(
                event_time = event.time,
                now = self.now,
                event = event.kind.type_name(),
                "Popped event earlier than current time, processing at current time"
            );
            self.stats.anomalies += 1;
        } else {
            self.now = event.time;
        }

        self.stats.events_processed += 1;
        trace!(
            time = self.now,
            sequence = event.sequence,
            event = %event.kind,
            "Processing event"
        );

        self.dispatch(event.kind);
        self.notify();
        true
    }

    /// Queue `kind` at absolute time `at`, clamped to the current time.
    pub(crate) fn schedule_at(&mut self, at: VirtualTime, kind: EventKind) {
        let key = self.queue.schedule(at, self.now, kind);
        if key.time != at {
            self.stats.clamped_schedules += 1;
        }
    }

    /// Queue `kind` `delay` time units from now.
    pub(crate) fn schedule_after(&mut self, delay: VirtualTime, kind: EventKind) {
        self.schedule_at(self.now.saturating_add(delay), kind);
    }

    /// Append a history entry snapshotting every node.
    pub(crate) fn record(&mut self, kind: HistoryKind, details: String, involved: Vec<NodeId>) {
        let snapshot = self.nodes.iter().map(Node::snapshot).collect();
        self.history.push(HistoryEntry {
            time: self.now,
            kind,
            details,
            involved,
            snapshot,
        });
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_update(self.network.topology(), &self.nodes, self.now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricart_core::Message;
    use ricart_types::{DelayRange, MessageKind, RequestTimestamp};
    use tracing_test::traced_test;

    fn quiet_sim(num_nodes: u32) -> Simulation {
        Simulation::new(SimulationConfig::new(num_nodes)).unwrap()
    }

    #[traced_test]
    #[test]
    fn test_exit_when_not_held_records_error() {
        let mut sim = quiet_sim(2);
        sim.schedule_at(3, EventKind::CsExit { node: NodeId(1) });
        assert!(sim.step());

        let entry = sim.history().last().unwrap();
        assert_eq!(entry.kind, HistoryKind::Error);
        assert_eq!(entry.details, "Node 1 CS_EXIT event ignored (State was IDLE)");
        assert_eq!(sim.node(NodeId(1)).unwrap().state(), NodeState::Idle);
        assert_eq!(sim.stats().anomalies, 1);
        assert!(logs_contain("not HELD"));
    }

    #[traced_test]
    #[test]
    fn test_event_for_unknown_node_records_unknown() {
        let mut sim = quiet_sim(2);
        sim.schedule_at(0, EventKind::CsEnter { node: NodeId(4) });
        sim.schedule_at(
            1,
            EventKind::MessageArrival(Message::reply(NodeId(9), NodeId(0), 1)),
        );

        assert_eq!(
            sim.step_until_significant(DEFAULT_STEP_LIMIT),
            StepOutcome::Significant { steps: 1 }
        );
        assert_eq!(
            sim.step_until_significant(DEFAULT_STEP_LIMIT),
            StepOutcome::Significant { steps: 1 }
        );
        assert_eq!(sim.history().of_kind(HistoryKind::Unknown).count(), 2);
        assert!(sim.nodes().iter().all(|n| n.state() == NodeState::Idle));
    }

    #[traced_test]
    #[test]
    fn test_forced_entry_is_tolerated() {
        let mut sim = quiet_sim(3);
        assert!(sim.want_cs(NodeId(0)));
        sim.schedule_at(0, EventKind::CsEnter { node: NodeId(0) });

        // Both replies are still in flight
        assert!(sim.step());
        assert_eq!(sim.node(NodeId(0)).unwrap().state(), NodeState::Held);
        assert!(sim.node(NodeId(0)).unwrap().outstanding_replies().is_empty());
        assert!(sim.stats().anomalies >= 1);
        assert!(logs_contain("unexpected state"));
    }

    #[traced_test]
    #[test]
    fn test_unsolicited_reply_is_noted() {
        let mut sim = quiet_sim(2);
        sim.schedule_at(
            2,
            EventKind::MessageArrival(Message::reply(NodeId(1), NodeId(0), 7)),
        );
        sim.step();

        let entry = sim.history().last().unwrap();
        assert_eq!(entry.kind, HistoryKind::MessageArrival);
        assert!(entry.details.contains("reply while not WANTED ignored"));
        // Not recorded in transit, and the clock still merges
        assert!(logs_contain("not found in transit"));
        assert_eq!(sim.node(NodeId(0)).unwrap().clock(), 8);
        assert_eq!(sim.stats().anomalies, 2);
    }

    /// Step `sim` until `node` holds the critical section.
    fn step_until_held(sim: &mut Simulation, node: NodeId) {
        while sim.node(node).unwrap().state() != NodeState::Held {
            assert!(sim.step());
        }
    }

    #[traced_test]
    #[test]
    fn test_repeated_and_unstamped_requests_at_holder() {
        let mut sim = quiet_sim(3);
        assert!(sim.want_cs(NodeId(0)));
        step_until_held(&mut sim, NodeId(0));
        let anomalies = sim.stats().anomalies;
        let deferrals = sim.stats().deferrals;

        let stamped =
            Message::request(NodeId(1), NodeId(0), RequestTimestamp::new(40, NodeId(1)));
        let unstamped = Message {
            kind: MessageKind::Request,
            sender: NodeId(2),
            receiver: NodeId(0),
            msg_clock: 3,
            request_ts: None,
        };
        let now = sim.now();
        sim.schedule_at(now, EventKind::MessageArrival(stamped.clone()));
        sim.schedule_at(now, EventKind::MessageArrival(stamped));
        sim.schedule_at(now, EventKind::MessageArrival(unstamped));
        for _ in 0..3 {
            assert!(sim.step());
        }
        assert_eq!(sim.now(), now);

        let notes: Vec<&str> = sim
            .history()
            .iter()
            .rev()
            .take(3)
            .map(|e| e.details.as_str())
            .collect();
        assert!(notes[0].ends_with("(request carried no timestamp)"));
        assert!(notes[1].ends_with("(duplicate deferral ignored)"));
        assert!(!notes[2].contains('('));

        let holder = sim.node(NodeId(0)).unwrap();
        assert_eq!(holder.state(), NodeState::Held);
        assert_eq!(holder.deferred_queue().collect::<Vec<_>>(), vec![NodeId(1), NodeId(2)]);
        assert_eq!(sim.stats().deferrals, deferrals + 2);
        // Three untracked arrivals, one duplicate, one missing timestamp
        assert_eq!(sim.stats().anomalies, anomalies + 5);
        assert!(logs_contain("Sender already in deferred queue"));
        assert!(logs_contain("REQUEST without request timestamp"));

        // Both deferred senders get their reply on exit
        sim.run_to_quiescence(DEFAULT_STEP_LIMIT);
        let exit = sim.history().of_kind(HistoryKind::CsExit).last().unwrap();
        assert_eq!(exit.involved, vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[traced_test]
    #[test]
    fn test_huge_delays_saturate_instead_of_overflowing() {
        let config = SimulationConfig::new(2)
            .with_default_delay(DelayRange::constant(VirtualTime::MAX))
            .with_scheduled_request(NodeId(0), 1);
        let mut sim = Simulation::new(config).unwrap();

        assert!(sim.step());
        assert_eq!(sim.now(), 1);
        assert_eq!(sim.next_event_time(), Some(VirtualTime::MAX));
        let edge = EdgeKey::new(NodeId(0), NodeId(1)).unwrap();
        assert_eq!(sim.in_transit(edge)[0].arrival_time, VirtualTime::MAX);

        sim.run_to_quiescence(DEFAULT_STEP_LIMIT);
        assert_eq!(sim.now(), VirtualTime::MAX);
        assert_eq!(sim.stats().cs_entries, 1);
        assert_eq!(sim.stats().cs_exits, 1);
        assert_eq!(sim.pending_event_count(), 0);
    }

    #[test]
    fn test_stats_count_messages() {
        let mut sim = quiet_sim(4);
        sim.want_cs(NodeId(2));
        sim.run_to_quiescence(DEFAULT_STEP_LIMIT);

        let stats = sim.stats();
        assert_eq!(stats.requests_initiated, 1);
        assert_eq!(stats.requests_sent, 3);
        assert_eq!(stats.replies_sent, 3);
        assert_eq!(stats.messages_sent(), 6);
        assert_eq!(stats.cs_entries, 1);
        assert_eq!(stats.cs_exits, 1);
        assert_eq!(sim.holders().count(), 0);
    }
}

//! Ricart-Agrawala protocol handler.
//!
//! Interprets popped events against node state. Every handler tolerates
//! out-of-state input: anomalies are logged, counted and noted in history,
//! and the run continues.

use crate::node::{ReplyOutcome, RequestDecision};
use crate::Simulation;
use ricart_core::{EventKind, HistoryKind, Message, TransitMessage};
use ricart_types::{MessageKind, NodeId, NodeState, RequestTimestamp};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

impl Simulation {
    /// Route one popped event to its handler.
    pub(crate) fn dispatch(&mut self, kind: EventKind) {
        let topology = self.network.topology();
        let sender_known = match &kind {
            EventKind::MessageArrival(message) => topology.contains(message.sender),
            _ => true,
        };
        if !topology.contains(kind.target_node()) || !sender_known {
            error!(event = %kind, "Event refers to a node that does not exist");
            self.stats.anomalies += 1;
            self.record(
                HistoryKind::Unknown,
                format!("Unroutable event {kind}"),
                vec![],
            );
            return;
        }

        match kind {
            EventKind::MessageArrival(message) => self.handle_message_arrival(message),
            EventKind::CsEnter { node } => self.enter_cs(node),
            EventKind::CsExit { node } => self.handle_cs_exit(node),
            EventKind::ScheduledRequest { node } => self.handle_scheduled_request(node),
        }
    }

    /// IDLE → WANTED and broadcast REQUEST. Returns `false` if the node is
    /// unknown or not IDLE.
    pub(crate) fn request_cs(&mut self, node: NodeId) -> bool {
        let Some(state) = self.nodes.get(node.index()).map(|n| n.state()) else {
            warn!(%node, "Node not found, cannot request CS");
            return false;
        };
        if state != NodeState::Idle {
            info!(time = self.now, %node, %state, "Node cannot want CS");
            return false;
        }

        let peers: Vec<NodeId> = self.network.topology().peers_of(node).collect();
        let ts = self.nodes[node.index()].begin_request(peers.iter().copied().collect());
        self.stats.requests_initiated += 1;
        info!(time = self.now, %node, %ts, "Node wants CS");

        if peers.is_empty() {
            info!(%node, "Only node in the system, entering CS without messages");
            self.schedule_at(self.now, EventKind::CsEnter { node });
        } else {
            for peer in peers {
                self.send_message(Message::request(node, peer, ts));
            }
        }
        true
    }

    /// Put `message` on the wire.
    fn send_message(&mut self, message: Message) {
        let Some(edge) = message.edge() else {
            warn!(node = %message.sender, "Attempt to send message to itself, skipping");
            self.stats.anomalies += 1;
            return;
        };

        let delay = self.network.sample_delay(message.sender, message.receiver);
        let arrival_time = self.now.saturating_add(delay);

        debug!(
            time = self.now,
            sender = %message.sender,
            receiver = %message.receiver,
            kind = %message.kind,
            msg_clock = message.msg_clock,
            delay,
            arrival_time,
            "Sending message"
        );

        self.in_transit.record(
            edge,
            TransitMessage {
                kind: message.kind,
                sender: message.sender,
                receiver: message.receiver,
                send_time: self.now,
                arrival_time,
            },
        );
        match message.kind {
            MessageKind::Request => self.stats.requests_sent += 1,
            MessageKind::Reply => self.stats.replies_sent += 1,
        }

        self.schedule_at(arrival_time, EventKind::MessageArrival(message));
    }

    fn handle_message_arrival(&mut self, message: Message) {
        let sender = message.sender;
        let receiver = message.receiver;

        if let Some(edge) = message.edge() {
            if self.in_transit.complete(edge, &message, self.now).is_none() {
                warn!(
                    time = self.now,
                    message = %message,
                    "Arrived message not found in transit list"
                );
                self.stats.anomalies += 1;
            }
        }

        let clock = self.nodes[receiver.index()].tick(Some(message.msg_clock));
        debug!(
            time = self.now,
            %receiver,
            %sender,
            kind = %message.kind,
            msg_clock = message.msg_clock,
            clock,
            "Message received"
        );

        let note = match message.kind {
            MessageKind::Request => self.handle_request(receiver, sender, message.request_ts),
            MessageKind::Reply => self.handle_reply(receiver, sender),
        };

        let mut details = format!("{} {}->{} processed.", message.kind, sender, receiver);
        if let Some(note) = note {
            details.push_str(&format!(" ({note})"));
        }
        self.record(HistoryKind::MessageArrival, details, vec![receiver, sender]);
    }

    /// Apply the priority rule. Returns a note for the history entry if
    /// something was off.
    fn handle_request(
        &mut self,
        receiver: NodeId,
        sender: NodeId,
        sender_ts: Option<RequestTimestamp>,
    ) -> Option<&'static str> {
        let mut note = None;
        if sender_ts.is_none() {
            warn!(%receiver, %sender, "REQUEST without request timestamp, treating as lowest priority");
            self.stats.anomalies += 1;
            note = Some("request carried no timestamp");
        }

        let node = &self.nodes[receiver.index()];
        match node.decide(sender_ts) {
            RequestDecision::Reply => {
                debug!(
                    %receiver,
                    %sender,
                    state = %node.state(),
                    own_ts = ?node.request_ts(),
                    sender_ts = ?sender_ts,
                    "Replying to request"
                );
                let clock = self.nodes[receiver.index()].tick(None);
                self.send_message(Message::reply(receiver, sender, clock));
            }
            RequestDecision::Defer => {
                if self.nodes[receiver.index()].defer(sender) {
                    self.stats.deferrals += 1;
                    debug!(
                        %receiver,
                        %sender,
                        deferred = self.nodes[receiver.index()].deferred_len(),
                        "Deferring request"
                    );
                } else {
                    warn!(%receiver, %sender, "Sender already in deferred queue");
                    self.stats.anomalies += 1;
                    note = Some("duplicate deferral ignored");
                }
            }
        }
        note
    }

    fn handle_reply(&mut self, receiver: NodeId, sender: NodeId) -> Option<&'static str> {
        match self.nodes[receiver.index()].record_reply(sender) {
            ReplyOutcome::Accepted { remaining: 0 } => {
                debug!(%receiver, %sender, "Last reply received");
                self.schedule_at(self.now, EventKind::CsEnter { node: receiver });
                None
            }
            ReplyOutcome::Accepted { remaining } => {
                debug!(%receiver, %sender, remaining, "Reply received");
                None
            }
            ReplyOutcome::Unexpected => {
                let outstanding: BTreeSet<NodeId> =
                    self.nodes[receiver.index()].outstanding_replies().clone();
                warn!(%receiver, %sender, ?outstanding, "Unexpected or duplicate reply ignored");
                self.stats.anomalies += 1;
                Some("unexpected reply ignored")
            }
            ReplyOutcome::NotWanted => {
                warn!(
                    %receiver,
                    %sender,
                    state = %self.nodes[receiver.index()].state(),
                    "Reply received while not WANTED, ignored"
                );
                self.stats.anomalies += 1;
                Some("reply while not WANTED ignored")
            }
        }
    }

    fn enter_cs(&mut self, node: NodeId) {
        let entry = &mut self.nodes[node.index()];
        let prior = entry.state();
        let valid = entry.enter_cs();
        let duration = entry.cs_duration();

        if !valid {
            warn!(%node, state = %prior, "Entering CS from unexpected state");
            self.stats.anomalies += 1;
        }
        self.stats.cs_entries += 1;
        info!(time = self.now, %node, duration, "Entered critical section");

        let mut details = format!("Node {} entered CS (Duration: {})", node.0, duration);
        if !valid {
            details.push_str(&format!(" from unexpected state {prior}"));
        }
        self.record(HistoryKind::CsEnter, details, vec![node]);
        self.schedule_after(duration, EventKind::CsExit { node });
    }

    fn handle_cs_exit(&mut self, node: NodeId) {
        let state = self.nodes[node.index()].state();
        let Some(deferred) = self.nodes[node.index()].exit_cs() else {
            error!(%node, %state, "CS_EXIT event but node is not HELD, ignoring exit");
            self.stats.anomalies += 1;
            self.record(
                HistoryKind::Error,
                format!("Node {} CS_EXIT event ignored (State was {})", node.0, state),
                vec![node],
            );
            return;
        };

        self.stats.cs_exits += 1;
        let mut details = format!("Node {} exited CS.", node.0);
        let mut involved = vec![node];

        if deferred.is_empty() {
            details.push_str(" No deferred requests.");
        } else {
            let clock = self.nodes[node.index()].tick(None);
            let targets: Vec<String> = deferred.iter().map(|n| n.0.to_string()).collect();
            details.push_str(&format!(
                " Sending {} deferred replies to [{}].",
                deferred.len(),
                targets.join(", ")
            ));
            for &waiting in &deferred {
                self.send_message(Message::reply(node, waiting, clock));
            }
            involved.extend(deferred);
        }

        info!(
            time = self.now,
            %node,
            deferred_replies = involved.len() - 1,
            "Exited critical section"
        );
        self.record(HistoryKind::CsExit, details, involved);
    }

    fn handle_scheduled_request(&mut self, node: NodeId) {
        info!(time = self.now, %node, "Handling scheduled request");
        let initiated = self.request_cs(node);
        let outcome = if initiated {
            "(Initiated)"
        } else {
            "(Failed - Not IDLE)"
        };
        self.record(
            HistoryKind::ScheduledRequest,
            format!("Node {} scheduled request triggered. {}", node.0, outcome),
            vec![node],
        );
    }
}

//! End-of-run summary.

use ricart_core::HistoryKind;
use ricart_simulation::Simulation;
use ricart_types::{NodeId, NodeState, VirtualTime};
use serde::Serialize;
use std::fmt;

/// Final state of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    /// The node.
    pub node: NodeId,
    /// State at the end of the run.
    pub state: NodeState,
    /// Lamport clock at the end of the run.
    pub clock: u64,
    /// Times this node entered the critical section.
    pub cs_entries: u64,
}

/// Summary of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Simulation time when the report was taken.
    pub final_time: VirtualTime,
    /// Events popped from the queue.
    pub events_processed: u64,
    /// REQUEST and REPLY messages put on the wire.
    pub messages_sent: u64,
    /// Requests answered later instead of immediately.
    pub deferrals: u64,
    /// Tolerated protocol anomalies.
    pub anomalies: u64,
    /// Requests that moved a node from IDLE to WANTED.
    pub requests_initiated: u64,
    /// Critical-section entries across all nodes.
    pub cs_entries: u64,
    /// Largest number of HELD nodes in any history snapshot.
    pub max_concurrent_holders: usize,
    /// Events still queued.
    pub pending_events: usize,
    /// Per-node summaries in id order.
    pub nodes: Vec<NodeSummary>,
}

impl RunReport {
    /// Summarize the current state and history of `sim`.
    pub fn from_simulation(sim: &Simulation) -> Self {
        let history = sim.history();
        let max_concurrent_holders = history
            .iter()
            .map(|entry| entry.holders().count())
            .max()
            .unwrap_or(0);

        let nodes = sim
            .nodes()
            .iter()
            .map(|node| NodeSummary {
                node: node.id(),
                state: node.state(),
                clock: node.clock(),
                cs_entries: history
                    .of_kind(HistoryKind::CsEnter)
                    .filter(|entry| entry.involved.first() == Some(&node.id()))
                    .count() as u64,
            })
            .collect();

        let stats = sim.stats();
        Self {
            final_time: sim.now(),
            events_processed: stats.events_processed,
            messages_sent: stats.messages_sent(),
            deferrals: stats.deferrals,
            anomalies: stats.anomalies,
            requests_initiated: stats.requests_initiated,
            cs_entries: stats.cs_entries,
            max_concurrent_holders,
            pending_events: sim.pending_event_count(),
            nodes,
        }
    }

    /// No snapshot ever showed two nodes in the critical section.
    pub fn mutual_exclusion_held(&self) -> bool {
        self.max_concurrent_holders <= 1
    }

    /// Every initiated request has entered and left the critical section.
    pub fn all_requests_served(&self) -> bool {
        self.cs_entries == self.requests_initiated
            && self.nodes.iter().all(|n| n.state == NodeState::Idle)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ricart-Agrawala run report")?;
        writeln!(f, "  final time          : {}", self.final_time)?;
        writeln!(f, "  events processed    : {}", self.events_processed)?;
        writeln!(f, "  messages sent       : {}", self.messages_sent)?;
        writeln!(f, "  deferrals           : {}", self.deferrals)?;
        writeln!(f, "  anomalies           : {}", self.anomalies)?;
        writeln!(f, "  pending events      : {}", self.pending_events)?;
        writeln!(
            f,
            "  mutual exclusion    : {} (max holders {})",
            if self.mutual_exclusion_held() { "ok" } else { "VIOLATED" },
            self.max_concurrent_holders
        )?;
        writeln!(
            f,
            "  requests served     : {}/{}{}",
            self.cs_entries,
            self.requests_initiated,
            if self.all_requests_served() { "" } else { " (incomplete)" }
        )?;
        writeln!(f)?;
        writeln!(f, "  {:<6} {:<7} {:>6} {:>10}", "node", "state", "clock", "cs entries")?;
        for node in &self.nodes {
            writeln!(
                f,
                "  {:<6} {:<7} {:>6} {:>10}",
                node.node.to_string(),
                node.state.name(),
                node.clock,
                node.cs_entries
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricart_simulation::{SimulationConfig, DEFAULT_STEP_LIMIT};
    use ricart_types::DelayRange;

    fn finished_run() -> Simulation {
        let config = SimulationConfig::new(3)
            .with_default_cs_duration(10)
            .with_default_delay(DelayRange::constant(2))
            .with_scheduled_request(NodeId(0), 0)
            .with_scheduled_request(NodeId(1), 0)
            .with_scheduled_request(NodeId(1), 100);
        let mut sim = Simulation::new(config).unwrap();
        sim.run_to_quiescence(DEFAULT_STEP_LIMIT);
        sim
    }

    #[test]
    fn test_report_counts_entries_per_node() {
        let report = RunReport::from_simulation(&finished_run());

        assert_eq!(report.cs_entries, 3);
        assert_eq!(report.requests_initiated, 3);
        assert_eq!(report.max_concurrent_holders, 1);
        assert!(report.mutual_exclusion_held());
        assert!(report.all_requests_served());
        let per_node: Vec<u64> = report.nodes.iter().map(|n| n.cs_entries).collect();
        assert_eq!(per_node, vec![1, 2, 0]);
    }

    #[test]
    fn test_report_flags_unfinished_run() {
        let mut sim = finished_run();
        sim.want_cs(NodeId(2));
        let report = RunReport::from_simulation(&sim);
        assert!(!report.all_requests_served());
        assert!(report.to_string().contains("(incomplete)"));
    }

    #[test]
    fn test_table_lists_every_node() {
        let table = RunReport::from_simulation(&finished_run()).to_string();
        assert!(table.contains("mutual exclusion    : ok"));
        assert!(table.contains("requests served     : 3/3"));
        for name in ["N0", "N1", "N2"] {
            assert!(table.contains(name));
        }
    }
}

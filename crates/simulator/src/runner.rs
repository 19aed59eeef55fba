//! Drives a simulation to completion and reports on it.

use crate::report::RunReport;
use ricart_core::ConfigError;
use ricart_simulation::{Simulation, SimulationConfig};
use ricart_types::VirtualTime;
use tracing::{info, info_span, warn};

/// Batch runner around a [`Simulation`].
pub struct Simulator {
    simulation: Simulation,
}

impl Simulator {
    /// Create a simulator. Log output of the run goes under a `run` span.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let span = info_span!("run", seed = config.seed, num_nodes = config.num_nodes);
        let simulation = Simulation::builder(config).with_span(span).build()?;
        Ok(Self { simulation })
    }

    /// The underlying simulation.
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Process everything due in the next `duration` time units and move the
    /// clock to the end of the window.
    pub fn run_for(&mut self, duration: VirtualTime) -> RunReport {
        let start = self.simulation.now();
        if duration > 0 {
            self.simulation.advance_by(duration);
        }
        let report = self.report();
        info!(
            from = start,
            to = report.final_time,
            events = report.events_processed,
            cs_entries = report.cs_entries,
            "Run window complete"
        );
        report
    }

    /// Step until no events remain or `max_events` were processed.
    pub fn run_until_idle(&mut self, max_events: usize) -> RunReport {
        let processed = self.simulation.run_to_quiescence(max_events);
        let report = self.report();
        if report.pending_events > 0 {
            warn!(
                processed,
                pending = report.pending_events,
                "Stopped before the simulation went idle"
            );
        } else {
            info!(
                processed,
                final_time = report.final_time,
                cs_entries = report.cs_entries,
                "Simulation idle"
            );
        }
        report
    }

    /// Report on the current state without running.
    pub fn report(&self) -> RunReport {
        RunReport::from_simulation(&self.simulation)
    }
}

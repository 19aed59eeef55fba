//! Construction input for a simulation.

use ricart_core::ConfigError;
use ricart_types::{DelayRange, EdgeKey, NodeId, VirtualTime, DEFAULT_CS_DURATION};
use std::collections::BTreeMap;

/// Configuration for a simulation run.
///
/// Anything not set explicitly falls back to the defaults: every node spends
/// [`DEFAULT_CS_DURATION`] in the critical section and every edge uses
/// [`DelayRange::default`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of nodes in the network.
    pub num_nodes: u32,

    /// Per-node critical-section duration overrides.
    pub cs_durations: BTreeMap<NodeId, VirtualTime>,

    /// Per-edge delay range overrides.
    pub edge_delays: BTreeMap<EdgeKey, DelayRange>,

    /// Absolute virtual times at which each node requests the critical section.
    pub scheduled_requests: BTreeMap<NodeId, Vec<VirtualTime>>,

    /// Critical-section duration for nodes without an override.
    pub default_cs_duration: VirtualTime,

    /// Delay range for edges without an override.
    pub default_delay: DelayRange,

    /// Random seed for delay sampling.
    pub seed: u64,
}

impl SimulationConfig {
    /// Create a configuration for `num_nodes` nodes with all defaults.
    pub fn new(num_nodes: u32) -> Self {
        Self {
            num_nodes,
            cs_durations: BTreeMap::new(),
            edge_delays: BTreeMap::new(),
            scheduled_requests: BTreeMap::new(),
            default_cs_duration: DEFAULT_CS_DURATION,
            default_delay: DelayRange::default(),
            seed: 12345,
        }
    }

    /// Set one node's critical-section duration.
    pub fn with_cs_duration(mut self, node: NodeId, duration: VirtualTime) -> Self {
        self.cs_durations.insert(node, duration);
        self
    }

    /// Set the critical-section duration for nodes without an override.
    pub fn with_default_cs_duration(mut self, duration: VirtualTime) -> Self {
        self.default_cs_duration = duration;
        self
    }

    /// Set one edge's delay range.
    pub fn with_edge_delay(mut self, edge: EdgeKey, range: DelayRange) -> Self {
        self.edge_delays.insert(edge, range);
        self
    }

    /// Set the delay range for edges without an override.
    pub fn with_default_delay(mut self, range: DelayRange) -> Self {
        self.default_delay = range;
        self
    }

    /// Add a scheduled request for `node` at absolute time `at`.
    pub fn with_scheduled_request(mut self, node: NodeId, at: VirtualTime) -> Self {
        self.scheduled_requests.entry(node).or_default().push(at);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Critical-section duration that `node` will use.
    pub fn cs_duration_for(&self, node: NodeId) -> VirtualTime {
        self.cs_durations
            .get(&node)
            .copied()
            .unwrap_or(self.default_cs_duration)
    }

    /// Delay range that `edge` will use.
    pub fn delay_for(&self, edge: EdgeKey) -> DelayRange {
        self.edge_delays
            .get(&edge)
            .copied()
            .unwrap_or(self.default_delay)
    }

    /// Check the configuration before it is accepted into a simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_nodes == 0 {
            return Err(ConfigError::NoNodes);
        }

        let check_node = |context: &'static str, node: NodeId| {
            if node.0 < self.num_nodes {
                Ok(())
            } else {
                Err(ConfigError::UnknownNode {
                    context,
                    node,
                    num_nodes: self.num_nodes,
                })
            }
        };

        for node in self.cs_durations.keys() {
            check_node("cs_durations", *node)?;
        }
        for node in self.scheduled_requests.keys() {
            check_node("scheduled_requests", *node)?;
        }
        for (edge, range) in &self.edge_delays {
            check_node("edge_delays", edge.high())?;
            if !range.is_valid() {
                return Err(ConfigError::InvalidDelay {
                    edge: *edge,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        // An inverted default only counts if some edge falls back to it.
        if !self.default_delay.is_valid() {
            if let Some(edge) = EdgeKey::complete_graph(self.num_nodes)
                .find(|e| !self.edge_delays.contains_key(e))
            {
                return Err(ConfigError::InvalidDelay {
                    edge,
                    min: self.default_delay.min,
                    max: self.default_delay.max,
                });
            }
        }

        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(ricart_types::DEFAULT_NUM_NODES)
    }
}

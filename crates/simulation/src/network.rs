//! Simulated network with per-edge randomized latency.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ricart_core::Topology;
use ricart_types::{NodeId, VirtualTime};
use tracing::warn;

/// Delay used when no edge exists between two distinct nodes.
pub const MISSING_EDGE_DELAY: VirtualTime = 1;

/// Source of randomness for message delays.
///
/// Inject a seeded implementation to make runs exactly repeatable, or a
/// scripted one to force particular interleavings in tests.
pub trait DelaySource {
    /// Pick a delay in the inclusive range `[min, max]`.
    ///
    /// Only called with `min < max`. Results outside the range are clamped.
    fn sample(&mut self, min: VirtualTime, max: VirtualTime) -> VirtualTime;
}

/// Uniform delays from a seeded ChaCha8 generator.
#[derive(Debug, Clone)]
pub struct SeededDelaySource {
    rng: ChaCha8Rng,
}

impl SeededDelaySource {
    /// Create a source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DelaySource for SeededDelaySource {
    fn sample(&mut self, min: VirtualTime, max: VirtualTime) -> VirtualTime {
        self.rng.gen_range(min..=max)
    }
}

/// Network model for deterministic message delivery.
///
/// Owns the topology and the delay source. Every message is delivered; there
/// is no loss, duplication or partitioning.
pub struct SimulatedNetwork {
    topology: Topology,
    source: Box<dyn DelaySource>,
}

impl std::fmt::Debug for SimulatedNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedNetwork")
            .field("num_nodes", &self.topology.num_nodes())
            .field("edges", &self.topology.edge_count())
            .finish()
    }
}

impl SimulatedNetwork {
    /// Create a network over `topology` drawing delays from `source`.
    pub fn new(topology: Topology, source: Box<dyn DelaySource>) -> Self {
        Self { topology, source }
    }

    /// The static topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Sample the delay for one message from `from` to `to`.
    pub fn sample_delay(&mut self, from: NodeId, to: NodeId) -> VirtualTime {
        if from == to {
            return 0;
        }

        let Some(range) = self.topology.delay_range(from, to) else {
            warn!(
                %from,
                %to,
                delay = MISSING_EDGE_DELAY,
                "Edge not found for delay lookup, using fallback delay"
            );
            return MISSING_EDGE_DELAY;
        };

        let range = range.normalized();
        if range.is_constant() {
            range.min
        } else {
            self.source
                .sample(range.min, range.max)
                .clamp(range.min, range.max)
        }
    }
}

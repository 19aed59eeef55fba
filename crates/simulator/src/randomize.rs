//! Seeded generation of whole configurations.

use crate::config::{ConfigFile, Metadata};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ricart_types::{DelayRange, EdgeKey, NodeId, VirtualTime};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::debug;

/// Critical-section durations drawn per node.
pub const CS_DURATION_RANGE: RangeInclusive<VirtualTime> = 10..=50;

/// Minimum delays drawn per edge.
pub const MIN_DELAY_RANGE: RangeInclusive<VirtualTime> = 2..=12;

/// Added to the minimum to get the maximum delay.
pub const MAX_DELAY_SPREAD: RangeInclusive<VirtualTime> = 1..=20;

/// Upper bound on scheduled requests per node.
pub const MAX_REQUESTS_PER_NODE: usize = 3;

/// Latest time a generated request may be scheduled at.
pub const LATEST_REQUEST_TIME: VirtualTime = 250;

/// Generates random but reproducible configurations.
#[derive(Debug, Clone)]
pub struct ConfigRandomizer {
    rng: ChaCha8Rng,
}

impl ConfigRandomizer {
    /// Create a randomizer from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw a full configuration for `num_nodes` nodes.
    ///
    /// Each node gets a CS duration and between zero and
    /// [`MAX_REQUESTS_PER_NODE`] distinct request times in ascending order;
    /// each edge gets a delay range of width at least one.
    pub fn generate(&mut self, num_nodes: u32) -> ConfigFile {
        let mut cs_durations = BTreeMap::new();
        let mut scheduled_requests = BTreeMap::new();

        for node in (0..num_nodes).map(NodeId) {
            cs_durations.insert(node, self.rng.gen_range(CS_DURATION_RANGE));

            let count = self.rng.gen_range(0..=MAX_REQUESTS_PER_NODE);
            let mut times: Vec<VirtualTime> =
                index::sample(&mut self.rng, LATEST_REQUEST_TIME as usize + 1, count)
                    .into_iter()
                    .map(|t| t as VirtualTime)
                    .collect();
            times.sort_unstable();
            scheduled_requests.insert(node, times);
        }

        let edge_delays = EdgeKey::complete_graph(num_nodes)
            .map(|edge| {
                let min = self.rng.gen_range(MIN_DELAY_RANGE);
                let max = min + self.rng.gen_range(MAX_DELAY_SPREAD);
                (edge, DelayRange::new(min, max))
            })
            .collect::<BTreeMap<_, _>>();

        debug!(
            num_nodes,
            edges = edge_delays.len(),
            requests = scheduled_requests.values().map(Vec::len).sum::<usize>(),
            "Generated random configuration"
        );

        ConfigFile {
            cs_durations,
            edge_delays,
            scheduled_requests,
            metadata: Some(Metadata::stamped(
                num_nodes,
                Some("Randomized configuration".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_within_ranges() {
        let mut randomizer = ConfigRandomizer::new(7);
        for _ in 0..10 {
            let file = randomizer.generate(5);
            assert_eq!(file.num_nodes(), 5);
            assert!(file.cs_durations.values().all(|d| CS_DURATION_RANGE.contains(d)));
            assert_eq!(file.edge_delays.len(), 10);
            for range in file.edge_delays.values() {
                assert!(MIN_DELAY_RANGE.contains(&range.min));
                assert!(range.max > range.min && range.max <= range.min + 20);
            }
            for times in file.scheduled_requests.values() {
                assert!(times.len() <= MAX_REQUESTS_PER_NODE);
                assert!(times.windows(2).all(|w| w[0] < w[1]));
                assert!(times.iter().all(|&t| t <= LATEST_REQUEST_TIME));
            }
            assert!(file.into_simulation_config().is_ok());
        }
    }

    #[test]
    fn test_same_seed_same_configuration() {
        let a = ConfigRandomizer::new(99).generate(4);
        let b = ConfigRandomizer::new(99).generate(4);
        assert_eq!(a.cs_durations, b.cs_durations);
        assert_eq!(a.edge_delays, b.edge_delays);
        assert_eq!(a.scheduled_requests, b.scheduled_requests);
    }
}

//! Per-edge delay ranges.

use crate::VirtualTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default minimum edge delay.
pub const DEFAULT_MIN_DELAY: VirtualTime = 5;

/// Default maximum edge delay.
pub const DEFAULT_MAX_DELAY: VirtualTime = 15;

/// Inclusive `[min, max]` latency range for one edge.
///
/// Serialized as `{"min": .., "max": ..}`. Values deserialized from untrusted
/// input may have `min > max`; use [`DelayRange::normalized`] before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelayRange {
    /// Smallest possible delay.
    pub min: VirtualTime,
    /// Largest possible delay.
    pub max: VirtualTime,
}

impl DelayRange {
    /// Create a range. Endpoints are taken as given.
    pub fn new(min: VirtualTime, max: VirtualTime) -> Self {
        Self { min, max }
    }

    /// A range that always yields `delay`.
    pub fn constant(delay: VirtualTime) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Whether `min <= max`.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Swap the endpoints if they are out of order.
    pub fn normalized(self) -> Self {
        Self {
            min: self.min.min(self.max),
            max: self.min.max(self.max),
        }
    }

    /// Whether only one delay value is possible.
    pub fn is_constant(&self) -> bool {
        self.min == self.max
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl fmt::Display for DelayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constant() {
            write!(f, "{}", self.min)
        } else {
            write!(f, "[{}..{}]", self.min, self.max)
        }
    }
}

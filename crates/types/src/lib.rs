//! Core types for the Ricart-Agrawala simulator.
//!
//! Everything in this crate is plain data: node identifiers, edge keys,
//! virtual time, Lamport clocks and the request timestamps derived from them,
//! node states and per-edge delay ranges. Behaviour lives in
//! `ricart-simulation`.

mod clock;
mod delay;
mod identifiers;
mod state;

pub use clock::{LamportClock, RequestTimestamp};
pub use delay::{DelayRange, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};
pub use identifiers::{EdgeKey, EdgeKeyParseError, NodeId};
pub use state::{MessageKind, NodeState};

/// Discrete simulation time.
///
/// Unrelated to wall-clock time; one unit is whatever the scenario says it is.
pub type VirtualTime = u64;

/// Default time a node spends in the critical section when not configured.
pub const DEFAULT_CS_DURATION: VirtualTime = 30;

/// Default number of nodes for generated configurations.
pub const DEFAULT_NUM_NODES: u32 = 5;

//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic discrete-event simulation of
//! Ricart-Agrawala mutual exclusion. Given the same configuration and seed,
//! it produces an identical history every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Simulation                         │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, EventKind>)    │ │
//! │  │     Ordered by: time, sequence                     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Protocol handler over nodes: Vec<Node>         │ │
//! │  │     IDLE → WANTED → HELD → IDLE                    │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Messages → SimulatedNetwork → new arrivals     │ │
//! │  │     History entry + observer notification          │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod config;
mod event_queue;
mod network;
mod node;
mod observer;
mod protocol;
mod runner;
mod transit;

pub use config::SimulationConfig;
pub use event_queue::{EventKey, EventQueue};
pub use network::{DelaySource, SeededDelaySource, SimulatedNetwork, MISSING_EDGE_DELAY};
pub use node::{Node, ReplyOutcome, RequestDecision};
pub use observer::Observer;
pub use runner::{Simulation, SimulationBuilder, SimulationStats, StepOutcome, DEFAULT_STEP_LIMIT};
pub use transit::InTransitTracker;

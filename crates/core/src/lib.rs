//! Core types for the Ricart-Agrawala simulator.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  schedule   ┌──────────────┐  dispatch   ┌──────────────┐
//! │ Event (queued)│ ──────────▶ │ Event queue  │ ──────────▶ │ Protocol     │
//! │ time + seq    │             │ (simulation) │             │ handler      │
//! └───────────────┘             └──────────────┘             └──────┬───────┘
//!                                                                    │ append
//!                                                                    ▼
//!                                                            ┌──────────────┐
//!                                                            │ History      │
//!                                                            │ (snapshots)  │
//!                                                            └──────────────┘
//! ```
//!
//! This crate holds the passive data that flows between those boxes. It has
//! no behaviour beyond construction and queries.

mod error;
mod event;
mod history;
mod message;
mod topology;

pub use error::{ConfigError, QueueError};
pub use event::{Event, EventKind};
pub use history::{History, HistoryEntry, HistoryKind, NodeSnapshot};
pub use message::{Message, TransitMessage};
pub use topology::Topology;

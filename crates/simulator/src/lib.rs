//! Ricart-Agrawala Simulator
//!
//! Front end for the simulation framework: configuration files, seeded
//! configuration generation, run reports and the `ricart-sim` binary.
//!
//! # Architecture
//!
//! The simulator builds on `ricart-simulation` to provide:
//!
//! - **Configuration files**: the JSON interchange format, templates and
//!   conversion to [`SimulationConfig`](ricart_simulation::SimulationConfig)
//! - **Randomization**: seeded generation of whole configurations
//! - **Reports**: per-node CS entries, safety and liveness checks, text table
//!
//! # Example
//!
//! ```ignore
//! use ricart_simulator::{ConfigFile, Simulator};
//!
//! let config = ConfigFile::load("config_nodes_5.json")?
//!     .into_simulation_config()?
//!     .with_seed(7);
//!
//! let mut simulator = Simulator::new(config)?;
//! let report = simulator.run_until_idle(10_000);
//!
//! assert!(report.mutual_exclusion_held());
//! println!("{report}");
//! ```

pub mod config;
pub mod randomize;
pub mod report;
pub mod runner;

pub use config::{parse_request_spec, ConfigFile, ConfigFileError, Metadata};
pub use randomize::ConfigRandomizer;
pub use report::{NodeSummary, RunReport};
pub use runner::Simulator;

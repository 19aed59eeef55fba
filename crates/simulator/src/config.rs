//! JSON configuration files.
//!
//! ```json
//! {
//!   "cs_durations": { "0": 30, "1": 20 },
//!   "edge_delays": { "0,1": { "min": 5, "max": 15 } },
//!   "scheduled_requests": { "0": [10, 45], "1": [] },
//!   "metadata": { "num_nodes": 2, "saved_at": "2024-05-01 12:00:00", "description": "..." }
//! }
//! ```
//!
//! Node ids are string keys, edges are `"u,v"` keys and `metadata` is optional.

use ricart_core::ConfigError;
use ricart_simulation::SimulationConfig;
use ricart_types::{DelayRange, EdgeKey, NodeId, VirtualTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors when reading, writing or interpreting a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON or a value of the wrong shape.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed but rejected by validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),

    /// A command-line request that is not `NODE@TIME`.
    #[error("invalid request {0:?}, expected NODE@TIME")]
    RequestSpec(String),
}

/// Free-form metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Node count. Inferred from the other sections when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_nodes: Option<u32>,

    /// Human-readable save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,

    /// Free text, e.g. `Template`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Anything else found in the block, preserved on save.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Metadata {
    /// Metadata stamped with the current local time.
    pub fn stamped(num_nodes: u32, description: Option<String>) -> Self {
        Self {
            num_nodes: Some(num_nodes),
            saved_at: Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            description,
            extra: BTreeMap::new(),
        }
    }
}

/// On-disk form of a simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Critical-section duration per node.
    pub cs_durations: BTreeMap<NodeId, VirtualTime>,

    /// Delay range per unordered node pair.
    pub edge_delays: BTreeMap<EdgeKey, DelayRange>,

    /// Absolute request times per node.
    pub scheduled_requests: BTreeMap<NodeId, Vec<VirtualTime>>,

    /// Optional metadata block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ConfigFile {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigFileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as indented JSON.
    pub fn to_json_string_pretty(&self) -> Result<String, ConfigFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            num_nodes = file.num_nodes(),
            "Loaded configuration"
        );
        Ok(file)
    }

    /// Write the configuration as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        let mut text = self.to_json_string_pretty()?;
        text.push('\n');
        std::fs::write(path, text).map_err(|source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Node count: `metadata.num_nodes` if present, otherwise one more than
    /// the largest node id mentioned anywhere (0 for an empty file).
    ///
    /// Saturates at `u32::MAX`, so a file naming node `u32::MAX` is later
    /// rejected as an unknown node.
    pub fn num_nodes(&self) -> u32 {
        if let Some(n) = self.metadata.as_ref().and_then(|m| m.num_nodes) {
            return n;
        }
        self.cs_durations
            .keys()
            .chain(self.scheduled_requests.keys())
            .copied()
            .chain(self.edge_delays.keys().map(EdgeKey::high))
            .map(|node| node.0.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Convert to a validated [`SimulationConfig`].
    ///
    /// Request times are sorted and deduplicated per node.
    pub fn into_simulation_config(self) -> Result<SimulationConfig, ConfigFileError> {
        let mut config = SimulationConfig::new(self.num_nodes());
        config.cs_durations = self.cs_durations;
        config.edge_delays = self.edge_delays;
        config.scheduled_requests = self
            .scheduled_requests
            .into_iter()
            .map(|(node, mut times)| {
                times.sort_unstable();
                times.dedup();
                (node, times)
            })
            .filter(|(_, times)| !times.is_empty())
            .collect();

        config.validate()?;
        debug!(
            num_nodes = config.num_nodes,
            edge_overrides = config.edge_delays.len(),
            "Configuration accepted"
        );
        Ok(config)
    }

    /// Capture `config` with every node and every edge written out.
    pub fn from_simulation_config(config: &SimulationConfig, description: Option<String>) -> Self {
        let nodes = (0..config.num_nodes).map(NodeId);
        Self {
            cs_durations: nodes
                .clone()
                .map(|node| (node, config.cs_duration_for(node)))
                .collect(),
            edge_delays: EdgeKey::complete_graph(config.num_nodes)
                .map(|edge| (edge, config.delay_for(edge)))
                .collect(),
            scheduled_requests: nodes
                .map(|node| {
                    let mut times = config
                        .scheduled_requests
                        .get(&node)
                        .cloned()
                        .unwrap_or_default();
                    times.sort_unstable();
                    times.dedup();
                    (node, times)
                })
                .collect(),
            metadata: Some(Metadata::stamped(config.num_nodes, description)),
        }
    }

    /// A complete file for `num_nodes` nodes with uniform values and no
    /// scheduled requests.
    pub fn template(
        num_nodes: u32,
        cs_duration: VirtualTime,
        min_delay: VirtualTime,
        max_delay: VirtualTime,
    ) -> Self {
        let config = SimulationConfig::new(num_nodes)
            .with_default_cs_duration(cs_duration)
            .with_default_delay(DelayRange::new(min_delay, max_delay));
        Self::from_simulation_config(&config, Some("Template".to_string()))
    }
}

/// Parse a `NODE@TIME` command-line request, e.g. `2@40`.
pub fn parse_request_spec(spec: &str) -> Result<(NodeId, VirtualTime), ConfigFileError> {
    let invalid = || ConfigFileError::RequestSpec(spec.to_string());
    let (node, at) = spec.split_once('@').ok_or_else(invalid)?;
    let node = node.trim().parse::<u32>().map_err(|_| invalid())?;
    let at = at.trim().parse::<VirtualTime>().map_err(|_| invalid())?;
    Ok((NodeId(node), at))
}

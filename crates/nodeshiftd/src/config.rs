//! nodeshiftd.toml configuration parser.
//!
//! ```toml
//! [log]
//! filter = "info,nodeshift=debug"
//! json = false
//!
//! [evaluation]
//! timeout_secs = 30
//! max_instance_types = 60
//!
//! [scoring]
//! bin_packing = 0.5
//! affinity = 0.3
//! balance = 0.2
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use nodeshift_placement::{MAX_INSTANCE_TYPES, PackingOptions, ScoringWeights};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log: LogConfig,
    pub evaluation: EvaluationConfig,
    pub scoring: ScoringWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,nodeshift=debug".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Upper bound on one pass. None waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Instance type options kept per replacement.
    pub max_instance_types: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_instance_types: MAX_INSTANCE_TYPES,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn packing_options(&self) -> PackingOptions {
        PackingOptions {
            weights: self.scoring.clone(),
            max_instance_types: self.evaluation.max_instance_types,
        }
    }
}

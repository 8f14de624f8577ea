use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerting::domain::alert_debouncer::DebouncePolicy;
use crate::alerting::infrastructure::sink_factory::SinkKind;
use crate::shared::constants::{
    ModelVariant, DEFAULT_CONFIDENCE, DEFAULT_COOLDOWN_SECS, DEFAULT_RESOLVE_TIMEOUT_SECS,
};
use crate::shared::region_spec::RegionSpec;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Edge,
    #[default]
    Cooldown,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Edge => write!(f, "edge"),
            PolicyKind::Cooldown => write!(f, "cooldown"),
        }
    }
}

/// Everything a watch session needs besides its source.
///
/// Deserialised from JSON with every field optional; command-line flags are
/// applied on top by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub confidence: f64,
    pub model_variant: ModelVariant,
    /// Overrides the variant's file lookup entirely.
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub policy: PolicyKind,
    pub cooldown_secs: f64,
    pub region: Option<RegionSpec>,
    pub outline_region: bool,
    pub resolve_timeout_secs: u64,
    pub drop_stale_frames: bool,
    pub alert: SinkKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            model_variant: ModelVariant::default(),
            model_path: None,
            model_url: None,
            policy: PolicyKind::default(),
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            region: None,
            outline_region: true,
            resolve_timeout_secs: DEFAULT_RESOLVE_TIMEOUT_SECS,
            drop_stale_frames: false,
            alert: SinkKind::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Per-user config file, used when no `--config` is given and it exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ROI Watch").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::OutOfRange {
                field: "confidence",
                value: self.confidence.to_string(),
                expected: "0.0 to 1.0",
            });
        }
        if !self.cooldown_secs.is_finite() || self.cooldown_secs < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "cooldown_secs",
                value: self.cooldown_secs.to_string(),
                expected: "a non-negative number of seconds",
            });
        }
        if self.resolve_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "resolve_timeout_secs",
                value: "0".to_string(),
                expected: "at least 1 second",
            });
        }
        Ok(())
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        match self.policy {
            PolicyKind::Edge => DebouncePolicy::EdgeTriggered,
            PolicyKind::Cooldown => DebouncePolicy::cooldown_secs(self.cooldown_secs),
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

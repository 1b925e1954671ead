//! Bridge configuration
//!
//! Loaded from an optional TOML file; every section and field has a
//! default so the bridge runs with no file at all. Durations accept
//! human-readable forms ("1s", "10m").

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CcmError, Result};
use crate::sender::SafetyLimits;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub http: HttpConfig,
    pub safety: SafetyConfig,
    pub nodes: NodesConfig,
}

/// HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8520,
        }
    }
}

/// Safety guardrail configuration, mirrored into [`SafetyLimits`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub allowed_actuators: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub min_send_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_irrigation_duration: Duration,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        let limits = SafetyLimits::default();
        let mut allowed: Vec<String> = limits.allowed_actuators.into_iter().collect();
        allowed.sort_unstable();
        Self {
            allowed_actuators: allowed,
            min_send_interval: limits.min_send_interval,
            max_irrigation_duration: limits.max_irrigation_duration,
        }
    }
}

impl SafetyConfig {
    pub fn to_limits(&self) -> SafetyLimits {
        SafetyLimits {
            allowed_actuators: self.allowed_actuators.iter().cloned().collect(),
            min_send_interval: self.min_send_interval,
            max_irrigation_duration: self.max_irrigation_duration,
        }
    }
}

/// Node-liveness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    /// Age in seconds beyond which a node no longer counts as active
    pub timeout_seconds: i64,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: crate::cache::DEFAULT_NODE_TIMEOUT_SECS,
        }
    }
}

impl BridgeConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CcmError::config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| CcmError::config(format!("cannot parse {}: {e}", path.display())))
    }
}

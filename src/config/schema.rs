//! Configuration schema definitions.
//!
//! This module defines the file-based configuration for breakers and the
//! observability stack. All types derive Serde traits for deserialization
//! from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::circuit_breaker::BreakerConfig;
use crate::resilience::classifier::FailureClassifier;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Settings applied to any breaker that does not override them.
    pub defaults: BreakerSettings,

    /// Breakers created up front.
    pub breakers: Vec<NamedBreaker>,
}

impl GuardConfig {
    /// Resolved settings for `name`, falling back to the defaults.
    pub fn settings_for(&self, name: &str) -> BreakerSettings {
        self.breakers
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.resolve(&self.defaults))
            .unwrap_or_else(|| self.defaults.clone())
    }
}

/// Thresholds and timings of a single breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerSettings {
    /// Minimum calls in the current minute before the rate is considered.
    pub volume_threshold: u32,

    /// Failure fraction (0.0 - 1.0) that trips the breaker.
    pub error_threshold_rate: f64,

    /// Time the breaker stays open before a probe, in milliseconds.
    pub sleep_window_ms: u64,

    /// Call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            volume_threshold: 10,
            error_threshold_rate: 0.5,
            sleep_window_ms: 5_000,
            timeout_ms: 2_000,
        }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        BreakerConfig {
            volume_threshold: u64::from(settings.volume_threshold),
            error_threshold_rate: settings.error_threshold_rate,
            sleep_window: Duration::from_millis(settings.sleep_window_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
            classifier: FailureClassifier::Default,
        }
    }
}

/// A breaker entry; omitted fields come from `defaults`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedBreaker {
    /// Registry name.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_threshold: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_window_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl NamedBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_threshold: None,
            error_threshold_rate: None,
            sleep_window_ms: None,
            timeout_ms: None,
        }
    }

    /// Merge this entry over `defaults`.
    pub fn resolve(&self, defaults: &BreakerSettings) -> BreakerSettings {
        BreakerSettings {
            volume_threshold: self.volume_threshold.unwrap_or(defaults.volume_threshold),
            error_threshold_rate: self.error_threshold_rate.unwrap_or(defaults.error_threshold_rate),
            sleep_window_ms: self.sleep_window_ms.unwrap_or(defaults.sleep_window_ms),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate within 0..=1, timeouts > 0)
//! - Detect duplicate or empty breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{BreakerSettings, GuardConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{scope}: error_threshold_rate {value} must be within 0.0..=1.0")]
    RateOutOfRange { scope: String, value: f64 },

    #[error("{scope}: timeout_ms must be greater than zero")]
    ZeroTimeout { scope: String },

    #[error("breaker #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("breaker '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_settings("defaults", &config.defaults, &mut errors);

    let mut seen = HashSet::new();
    for (index, named) in config.breakers.iter().enumerate() {
        if named.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
            continue;
        }
        if !seen.insert(named.name.as_str()) {
            errors.push(ValidationError::DuplicateName(named.name.clone()));
        }
        let scope = format!("breaker '{}'", named.name);
        check_settings(&scope, &named.resolve(&config.defaults), &mut errors);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_settings(scope: &str, settings: &BreakerSettings, errors: &mut Vec<ValidationError>) {
    // NaN fails the range check too.
    if !(0.0..=1.0).contains(&settings.error_threshold_rate) {
        errors.push(ValidationError::RateOutOfRange {
            scope: scope.to_string(),
            value: settings.error_threshold_rate,
        });
    }
    if settings.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            scope: scope.to_string(),
        });
    }
}

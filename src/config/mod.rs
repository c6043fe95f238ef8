//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → Registry::from_config builds the named breakers
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; breakers are first-writer-wins, so a
//!   reload would not reconfigure them anyway
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{BreakerSettings, GuardConfig, LogFormat, NamedBreaker, ObservabilityConfig};

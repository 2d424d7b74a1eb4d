//! Configuration for the Brass runtime.
//!
//! Layered TOML/YAML/environment loading via figment, plus validation of
//! the dispatcher and logging settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BrassConfig, DispatchConfig, LogFormat, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;

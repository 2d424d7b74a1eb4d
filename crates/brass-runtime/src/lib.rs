//! Brass Runtime - orchestration layer for the Brass dispatcher.
//!
//! This crate provides:
//! - Layered configuration (`brass.toml`/`brass.yaml`, `BRASS_*` variables)
//! - Logging initialization driven by that configuration
//! - [`BrassRuntime`], which owns the [`Dispatcher`](brass_framework::Dispatcher)
//!   and a background sweeper for expired abuse counters and bans
//!
//! ```ignore
//! use brass_runtime::BrassRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BrassRuntime::builder().registry(registry).build()?;
//!     runtime.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{BrassConfig, ConfigError, ConfigLoader, ConfigResult, DispatchConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BrassRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

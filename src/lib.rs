//! Driver for the Rainforest RAVEn USB smart-meter gateway
//!
//! The gateway reports meter data as a stream of small XML fragments over a
//! serial line. This library frames that stream, decodes every fragment into
//! a typed [`Reading`] and renders the XML commands the gateway accepts.

pub mod models;
pub mod config;
pub mod metering_raven;

// Re-export common types for easier access
pub use models::{FieldValue, HexId, Reading};
pub use config::{ConfigError, RavenConfig, SerialConfig};
pub use metering_raven::{
    decode_fragment, Command, CommandArg, CommandError, CommandName, Connection, ConnectionError,
    Fragment, FragmentReader, ParseError, RavenError,
};
#[cfg(feature = "monitor")]
pub use metering_raven::monitor::RavenMonitor;

/// Sets up `env_logger`, the filter is taken from `RAVEN_LOG_LEVEL`
/// and defaults to `info`. Calling it again is a no-op.
pub fn init_logging() {
    let default_filter = std::env::var("RAVEN_LOG_LEVEL").unwrap_or("info".to_string());
    let _ = env_logger::Builder::from_env(env_logger::Env::new().default_filter_or(default_filter))
        .try_init();
}

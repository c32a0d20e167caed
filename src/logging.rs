//! Logging setup
//!
//! The arena only emits `tracing` events; nothing is printed until a
//! subscriber is installed. `init` installs the process-wide subscriber
//! once; later calls report an error instead of replacing it.

use crate::config::{LogConfig, LogFormat};
use crate::error::{Error, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG`-style directives in `config.filter` are honored; an invalid
/// directive falls back to `info`.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directive()).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi),
            )
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

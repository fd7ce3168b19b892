//! Structured logging initialization.

use crate::config::LogFormat;
use crate::error::{CliError, CliResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,coinpilot=info,coinpilot_exec=info,coinpilot_connectors=info";

/// Install the global subscriber.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_logging(format: LogFormat) -> CliResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| CliError::Logging(e.to_string()))
}

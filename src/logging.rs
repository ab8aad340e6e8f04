//! Tracing initialization for the sitepipe binary
//!
//! Uses the standard RUST_LOG environment variable for filtering:
//! - `RUST_LOG=debug` - Set global level
//! - `RUST_LOG=sitepipe::watch=debug` - Set per-module levels
//!
//! Uses SITEPIPE_LOG_FORMAT for the output format:
//! - `compact` - Single-line output (default)
//! - `pretty` - Multi-line output with source locations
//! - `json` - JSON formatted output
//!
//! Logs go to stderr so stdout stays free for summaries and listings.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format.
pub const FORMAT_ENV: &str = "SITEPIPE_LOG_FORMAT";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to compact.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }

    fn from_env() -> Self {
        std::env::var(FORMAT_ENV).map(|v| Self::parse(&v)).unwrap_or(LogFormat::Compact)
    }
}

/// Default filter when RUST_LOG is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "sitepipe=debug,tower_http=debug,info"
    } else {
        "info"
    }
}

/// Initialize the global subscriber.
pub fn init(verbose: bool) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(false).json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    }
}

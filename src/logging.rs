//! Subscriber setup for the `segment` binary and integration tests.
//!
//! `RUST_LOG` picks the filter, `RUST_LOG_FORMAT=json` emits one JSON object
//! per event. Everything goes to stderr; stdout carries the segment listings.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "segmentation_kit=info";
pub const FORMAT_ENV: &str = "RUST_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (any case) falls back to text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    fn from_env() -> Self {
        std::env::var(FORMAT_ENV).map_or(Self::Text, |value| Self::parse(&value))
    }
}

pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Installs the global subscriber unless one is already set. `default_filter`
/// applies when `RUST_LOG` is unset or invalid.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(filter = default_filter, "logging initialised");
    }
}

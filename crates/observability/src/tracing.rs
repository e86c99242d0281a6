//! Tracing/logging initialization.
//!
//! `RUST_LOG` drives the filter (default `info`). Output is JSON unless
//! `GROUPPOOL_LOG_FORMAT=text`.

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "GROUPPOOL_LOG_FORMAT";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    /// Parse a format name; anything unrecognised yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" | "pretty" | "plain" => Some(Self::Text),
            _ => None,
        }
    }

    fn from_env() -> (Self, Option<String>) {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(raw) => match Self::parse(&raw) {
                Some(format) => (format, None),
                None => (Self::default(), Some(raw)),
            },
            Err(_) => (Self::default(), None),
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let (format, rejected) = LogFormat::from_env();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_ok(),
    };

    if let (true, Some(raw)) = (installed, rejected) {
        ::tracing::warn!(value = %raw, "unknown {LOG_FORMAT_ENV}; using json");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" TEXT "), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
        ::tracing::info!("still logging");
    }
}

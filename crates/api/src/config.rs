//! Process configuration, read from the environment at startup.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

pub const BIND_ADDR_ENV: &str = "GROUPPOOL_BIND_ADDR";
pub const DEFAULT_DURATION_ENV: &str = "GROUPPOOL_DEFAULT_DURATION_SECS";

/// One day.
pub const DEFAULT_DURATION_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Lock period used when a create request does not name one.
    pub default_duration_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            default_duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset keys keep their
    /// defaults; unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: setting(&lookup, BIND_ADDR_ENV, defaults.bind_addr),
            default_duration_secs: setting(
                &lookup,
                DEFAULT_DURATION_ENV,
                defaults.default_duration_secs,
            ),
        }
    }
}

fn setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                key,
                value = %raw,
                default = %default,
                "unparseable setting; using default"
            );
            default
        }
    }
}

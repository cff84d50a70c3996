//! Server configuration
//!
//! Environment-driven settings with the defaults of the reference
//! deployment: port 3000, hourly idle sweep, one-hour idle threshold.

use std::time::Duration;
use tracing::warn;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port for the HTTP and WebSocket surface
    pub port: u16,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
    /// Sessions idle for longer than this are removed
    pub idle_threshold: Duration,
}

impl Config {
    /// Read `PORT`, `SWEEP_INTERVAL_SECS` and `IDLE_THRESHOLD_SECS` from
    /// the environment, falling back to defaults on missing or unparsable
    /// values.
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            sweep_interval: Duration::from_secs(env_parse(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            idle_threshold: Duration::from_secs(env_parse(
                "IDLE_THRESHOLD_SECS",
                DEFAULT_IDLE_THRESHOLD_SECS,
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            idle_threshold: Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS),
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, "unparsable environment value, using default");
            default
        }),
        Err(_) => default,
    }
}

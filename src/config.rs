//! Layered configuration for the live index.
//!
//! Supports default values, a `tailindex.toml` file, and environment
//! variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `TAILINDEX_` and use double underscores to
//! separate nested levels:
//! - `TAILINDEX_WATCH__CHUNK_SIZE=4096` sets `watch.chunk_size`
//! - `TAILINDEX_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Capacity of per-watch event channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the notification broadcast channel.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Watch and read tuning.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging levels.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Bytes per read when draining a watched file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fallback poll period in milliseconds for appends the file notifier
    /// missed.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_channel_capacity() -> usize {
    256
}
fn default_broadcast_capacity() -> usize {
    128
}
fn default_chunk_size() -> usize {
    64 * 1024
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings layered from defaults, `tailindex.toml` (if present),
    /// and `TAILINDEX_`-prefixed environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("tailindex.toml"))
            .merge(Env::prefixed("TAILINDEX_").split("__"))
            .extract()
    }
}

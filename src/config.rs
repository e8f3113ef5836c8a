//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Default hours an unrequested entry survives the eviction sweep (8 days).
pub const DEFAULT_MAX_AGE_HOURS: u64 = 8 * 24;

// == Cache Config ==
/// Settings held by a single cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one file per cache entry
    pub base_path: PathBuf,
    /// Hours since last access after which the sweep deletes an entry
    pub max_age_hours: u64,
    /// Emit per-request progress at info level instead of debug
    pub verbose: bool,
    /// Seconds within which a prior validation is trusted without contacting
    /// the origin, 0 = always revalidate
    pub no_update_secs: u64,
}

impl CacheConfig {
    /// Creates a config for `base_path` with default age and revalidation policy.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            verbose: false,
            no_update_secs: 0,
        }
    }

    pub fn with_max_age_hours(mut self, hours: u64) -> Self {
        self.max_age_hours = hours;
        self
    }

    pub fn with_no_update_secs(mut self, secs: u64) -> Self {
        self.no_update_secs = secs;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// == Server Config ==
/// Process configuration for the gateway binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache instance settings
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between periodic eviction sweeps, 0 = only sweep at shutdown
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BASE_PATH` - Cache directory (required)
    /// - `CACHE_MAX_AGE` - Eviction age in hours (default: 192)
    /// - `CACHE_VERBOSE` - Progress diagnostics, `1`/`true`/`yes` (default: off)
    /// - `CACHE_NO_UPDATE` - No-revalidation window in seconds (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Periodic sweep frequency in seconds (default: 3600)
    pub fn from_env() -> Result<Self> {
        let base_path = env::var("CACHE_BASE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CacheError::Config("CACHE_BASE_PATH must be set".to_string()))?;

        let cache = CacheConfig {
            base_path: PathBuf::from(base_path),
            max_age_hours: env_or("CACHE_MAX_AGE", DEFAULT_MAX_AGE_HOURS),
            verbose: env::var("CACHE_VERBOSE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            no_update_secs: env_or("CACHE_NO_UPDATE", 0),
        };

        Ok(Self {
            cache,
            server_port: env_or("SERVER_PORT", 3000),
            sweep_interval: env_or("SWEEP_INTERVAL", 3600),
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

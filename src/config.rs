//! Configuration Module
//!
//! Handles loading and managing runtime configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the read cache can hold
    pub cache_max_entries: usize,
    /// Default TTL in milliseconds for cached reads
    pub cache_default_ttl_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Failed replay attempts after which a queued operation is dropped
    pub replay_max_attempts: u32,
    /// Whether the connectivity signal starts in the online state
    pub start_online: bool,
    /// Collections students may write to
    pub student_writable: Vec<String>,
    /// Local collections file to migrate at startup
    pub migration_source: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 50)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 3600000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `REPLAY_MAX_ATTEMPTS` - Attempts before a queued write is dropped (default: 3)
    /// - `START_ONLINE` - Initial connectivity state (default: true)
    /// - `STUDENT_WRITABLE` - Comma separated collections (default: todos)
    /// - `MIGRATION_SOURCE` - Optional path to a local collections JSON file
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES").unwrap_or(defaults.cache_max_entries),
            cache_default_ttl_ms: parse_var("CACHE_DEFAULT_TTL_MS")
                .unwrap_or(defaults.cache_default_ttl_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            replay_max_attempts: parse_var("REPLAY_MAX_ATTEMPTS")
                .unwrap_or(defaults.replay_max_attempts),
            start_online: parse_var("START_ONLINE").unwrap_or(defaults.start_online),
            student_writable: env::var("STUDENT_WRITABLE")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.student_writable),
            migration_source: env::var("MIGRATION_SOURCE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_entries: 50,
            cache_default_ttl_ms: 3_600_000,
            server_port: 3000,
            cleanup_interval: 60,
            replay_max_attempts: 3,
            start_online: true,
            student_writable: vec!["todos".to_string()],
            migration_source: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

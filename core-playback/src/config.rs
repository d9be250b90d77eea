//! # Playback Configuration
//!
//! Settings for the playback controller: retry policy, readiness timeout,
//! storage path normalisation, resolved-URL caching and initial output
//! levels.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slowest playback rate the controller will request.
pub const MIN_PLAYBACK_RATE: f64 = 0.25;

/// Fastest playback rate the controller will request.
pub const MAX_PLAYBACK_RATE: f64 = 3.0;

/// Playback controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Total attempts per load request before the error becomes terminal.
    ///
    /// Default: 3.
    #[serde(default = "default_max_load_attempts")]
    pub max_load_attempts: u32,

    /// Delay unit between attempts. After failed attempt `n` the next one
    /// starts after `n * retry_base_delay`.
    ///
    /// Default: 1 second.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,

    /// How long to wait for the media output to report it can play.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: Duration,

    /// Canonical first segment of every storage path (e.g. `"songs"`).
    ///
    /// Default: `"songs"`.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// Lifetime of a signed URL as issued by the resolver.
    ///
    /// Default: 1 hour.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl: Duration,

    /// Signed URLs are re-resolved this long before they expire.
    ///
    /// Default: 5 minutes.
    #[serde(default = "default_signed_url_refresh_margin")]
    pub signed_url_refresh_margin: Duration,

    /// Maximum number of resolved URLs kept in memory.
    ///
    /// Default: 128.
    #[serde(default = "default_url_cache_capacity")]
    pub url_cache_capacity: usize,

    /// Volume applied at `init()`, in `0.0..=1.0`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f64,

    /// Playback rate applied at `init()`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_initial_playback_rate")]
    pub initial_playback_rate: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_load_attempts: default_max_load_attempts(),
            retry_base_delay: default_retry_base_delay(),
            load_timeout: default_load_timeout(),
            storage_root: default_storage_root(),
            signed_url_ttl: default_signed_url_ttl(),
            signed_url_refresh_margin: default_signed_url_refresh_margin(),
            url_cache_capacity: default_url_cache_capacity(),
            initial_volume: default_initial_volume(),
            initial_playback_rate: default_initial_playback_rate(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_load_attempts == 0 {
            return Err("max_load_attempts must be > 0".to_string());
        }

        if self.load_timeout.is_zero() {
            return Err("load_timeout must be > 0".to_string());
        }

        if self.storage_root.trim_matches(|c: char| c == '/' || c.is_whitespace()).is_empty() {
            return Err("storage_root must name a path segment".to_string());
        }

        if self.signed_url_refresh_margin >= self.signed_url_ttl {
            return Err("signed_url_refresh_margin must be shorter than signed_url_ttl".to_string());
        }

        if self.url_cache_capacity == 0 {
            return Err("url_cache_capacity must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err("initial_volume must be between 0.0 and 1.0".to_string());
        }

        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&self.initial_playback_rate) {
            return Err(format!(
                "initial_playback_rate must be between {} and {}",
                MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE
            ));
        }

        Ok(())
    }

    /// How long a signed URL stays usable from the cache.
    pub fn signed_url_lifetime(&self) -> Duration {
        self.signed_url_ttl
            .saturating_sub(self.signed_url_refresh_margin)
    }

    /// Delay before the attempt that follows failed attempt `attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay * attempt
    }
}

fn default_max_load_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_storage_root() -> String {
    "songs".to_string()
}

fn default_signed_url_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_signed_url_refresh_margin() -> Duration {
    Duration::from_secs(300)
}

fn default_url_cache_capacity() -> usize {
    128
}

fn default_initial_volume() -> f64 {
    1.0
}

fn default_initial_playback_rate() -> f64 {
    1.0
}

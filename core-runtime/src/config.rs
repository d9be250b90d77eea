//! # Core Configuration Module
//!
//! Provides bridge injection and runtime settings for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every host capability the playback controller needs. It fails fast
//! with actionable messages when a required bridge is missing.
//!
//! ## Required Dependencies
//!
//! - `MediaHost` - The media-output handle the controller drives
//! - `TrackResolver` - Turns stored audio paths into playable URLs
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Time source used for signed-URL expiry (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_host(Arc::new(MyAudioElement::new()))
//!     .track_resolver(Arc::new(MyStorageResolver::new()))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no MediaHost or TrackResolver injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, MediaHost, SystemClock, TrackResolver};
use std::sync::Arc;

/// Upper bound for the event bus buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Media-output handle (required). Owned exclusively by the playback
    /// controller once handed over.
    pub media_host: Arc<dyn MediaHost>,

    /// Storage URL resolver (required)
    pub track_resolver: Arc<dyn TrackResolver>,

    /// Time source for URL cache expiry
    pub clock: Arc<dyn Clock>,

    /// Capacity of the event bus broadcast channel
    pub event_buffer_size: usize,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_host", &"MediaHost { ... }")
            .field("track_resolver", &"TrackResolver { ... }")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour of the playback core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Cache resolved URLs so replaying a track skips the resolver
    pub enable_url_cache: bool,

    /// Publish a `PositionChanged` event on every progress tick. Off by
    /// default; the observable state already carries the position.
    pub enable_position_events: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_url_cache: true,
            enable_position_events: false,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn media_host_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaHost".to_string(),
        message: "MediaHost implementation is required to output audio. \
                 Web: wrap an HTMLAudioElement. \
                 Desktop/Mobile: wrap the platform media player."
            .to_string(),
    }
}

fn track_resolver_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "TrackResolver".to_string(),
        message: "TrackResolver implementation is required to turn stored audio paths \
                 into playable URLs. Inject a resolver for your storage backend."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_host: Option<Arc<dyn MediaHost>>,
    track_resolver: Option<Arc<dyn TrackResolver>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the media-output handle (required).
    pub fn media_host(mut self, host: Arc<dyn MediaHost>) -> Self {
        self.media_host = Some(host);
        self
    }

    /// Sets the storage resolver (required).
    pub fn track_resolver(mut self, resolver: Arc<dyn TrackResolver>) -> Self {
        self.track_resolver = Some(resolver);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables the resolved-URL cache.
    ///
    /// Default: true
    pub fn enable_url_cache(mut self, enabled: bool) -> Self {
        self.features.enable_url_cache = enabled;
        self
    }

    /// Enables or disables per-tick position events.
    ///
    /// Default: false
    pub fn enable_position_events(mut self, enabled: bool) -> Self {
        self.features.enable_position_events = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// Returns an error if a required bridge is missing or a setting is out
    /// of range.
    pub fn build(self) -> Result<CoreConfig> {
        let media_host = self.media_host.ok_or_else(media_host_missing_error)?;
        let track_resolver = self
            .track_resolver
            .ok_or_else(track_resolver_missing_error)?;

        let config = CoreConfig {
            media_host,
            track_resolver,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

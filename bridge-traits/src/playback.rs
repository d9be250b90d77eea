//! Media-output bridge trait and supporting event types.
//!
//! A [`MediaHost`] is the single audio output the playback core drives. On
//! the web it wraps an `HTMLAudioElement`; desktop and mobile hosts wrap their
//! native player. The contract is deliberately small: accept a source URL,
//! expose the transport mutators, and report progress through callbacks
//! registered per [`MediaEventKind`].

use crate::{error::Result, platform::PlatformSendSync};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Kinds of notifications a host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    LoadStart,
    LoadedMetadata,
    CanPlay,
    TimeUpdate,
    Ended,
    Play,
    Pause,
    Waiting,
    CanPlayThrough,
    Error,
}

impl MediaEventKind {
    /// Every kind, in registration order.
    pub const ALL: [MediaEventKind; 10] = [
        MediaEventKind::LoadStart,
        MediaEventKind::LoadedMetadata,
        MediaEventKind::CanPlay,
        MediaEventKind::TimeUpdate,
        MediaEventKind::Ended,
        MediaEventKind::Play,
        MediaEventKind::Pause,
        MediaEventKind::Waiting,
        MediaEventKind::CanPlayThrough,
        MediaEventKind::Error,
    ];

    /// DOM event name for this kind, as web hosts register it.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEventKind::LoadStart => "loadstart",
            MediaEventKind::LoadedMetadata => "loadedmetadata",
            MediaEventKind::CanPlay => "canplay",
            MediaEventKind::TimeUpdate => "timeupdate",
            MediaEventKind::Ended => "ended",
            MediaEventKind::Play => "play",
            MediaEventKind::Pause => "pause",
            MediaEventKind::Waiting => "waiting",
            MediaEventKind::CanPlayThrough => "canplaythrough",
            MediaEventKind::Error => "error",
        }
    }
}

/// Native media error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    /// Code the host reported but that has no dedicated variant.
    Unknown(u16),
}

impl MediaErrorCode {
    /// Map the standard numeric media error codes (1 = aborted, 2 = network,
    /// 3 = decode, 4 = source not supported).
    pub fn from_native(code: u16) -> Self {
        match code {
            1 => MediaErrorCode::Aborted,
            2 => MediaErrorCode::Network,
            3 => MediaErrorCode::Decode,
            4 => MediaErrorCode::SourceNotSupported,
            other => MediaErrorCode::Unknown(other),
        }
    }
}

impl fmt::Display for MediaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaErrorCode::Aborted => write!(f, "aborted"),
            MediaErrorCode::Network => write!(f, "network"),
            MediaErrorCode::Decode => write!(f, "decode"),
            MediaErrorCode::SourceNotSupported => write!(f, "source not supported"),
            MediaErrorCode::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// Notification delivered by a host.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    /// Metadata is available. `duration` is in seconds and may be NaN or
    /// infinite for live or not-yet-probed streams.
    LoadedMetadata { duration: f64 },
    CanPlay,
    /// Playback position moved; `current_time` is in seconds.
    TimeUpdate { current_time: f64 },
    Ended,
    Play,
    Pause,
    Waiting,
    CanPlayThrough,
    Error {
        code: MediaErrorCode,
        message: Option<String>,
    },
}

impl MediaEvent {
    pub fn kind(&self) -> MediaEventKind {
        match self {
            MediaEvent::LoadStart => MediaEventKind::LoadStart,
            MediaEvent::LoadedMetadata { .. } => MediaEventKind::LoadedMetadata,
            MediaEvent::CanPlay => MediaEventKind::CanPlay,
            MediaEvent::TimeUpdate { .. } => MediaEventKind::TimeUpdate,
            MediaEvent::Ended => MediaEventKind::Ended,
            MediaEvent::Play => MediaEventKind::Play,
            MediaEvent::Pause => MediaEventKind::Pause,
            MediaEvent::Waiting => MediaEventKind::Waiting,
            MediaEvent::CanPlayThrough => MediaEventKind::CanPlayThrough,
            MediaEvent::Error { .. } => MediaEventKind::Error,
        }
    }
}

/// Failure reported by [`MediaHost::play`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// The host refused to start playback until the user interacts with it
    /// (browser autoplay policy and equivalents).
    #[error("Playback not allowed without user interaction: {0}")]
    NotAllowed(String),

    #[error("Media error ({code}): {message}")]
    Media {
        code: MediaErrorCode,
        message: String,
    },

    #[error("Media operation failed: {0}")]
    Other(String),
}

/// Callback registered for one [`MediaEventKind`].
#[cfg(not(target_arch = "wasm32"))]
pub type MediaCallback = Arc<dyn Fn(MediaEvent) + Send + Sync>;

#[cfg(target_arch = "wasm32")]
pub type MediaCallback = Arc<dyn Fn(MediaEvent)>;

/// The single audio output owned by the playback core.
///
/// Mutators are synchronous, mirroring property assignment on a media
/// element; only [`MediaHost::play`] is asynchronous because hosts may
/// reject it.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait MediaHost: PlatformSendSync {
    /// Replace the current source. `None` clears it.
    fn set_source(&self, url: Option<&str>);

    /// Start fetching the current source.
    fn load(&self);

    /// Request playback of the loaded source.
    async fn play(&self) -> std::result::Result<(), MediaError>;

    fn pause(&self);

    /// Move the playback position to `position_secs`.
    fn seek(&self, position_secs: f64);

    /// Volume in `0.0..=1.0`.
    fn set_volume(&self, volume: f64);

    /// Hosts may refuse rates they cannot render.
    fn set_playback_rate(&self, rate: f64) -> Result<()>;

    fn set_muted(&self, muted: bool);

    /// Register `callback` for every future event of `kind`.
    fn subscribe(&self, kind: MediaEventKind, callback: MediaCallback);

    /// Drop every registered callback and free the underlying output.
    fn release(&self);
}

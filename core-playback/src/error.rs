//! # Playback Error Types
//!
//! Two families live here:
//! - [`PlaybackError`]: caller mistakes, returned as `Err` from controller
//!   operations.
//! - [`PlaybackFailure`]: resolver and media failures. These never reach the
//!   caller as `Err`; the controller records them in the observable state.

use bridge_traits::{MediaError, MediaErrorCode, ResolveError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by controller operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Operation needs at least one track in the queue.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Start index does not point into the queue.
    #[error("Queue index {index} out of bounds (queue length {len})")]
    InvalidQueueIndex { index: usize, len: usize },

    /// Playback settings failed validation.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Classification of a failed load or resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ResolveNotFound,
    ResolvePermissionDenied,
    LoadTimeout,
    MediaDecode,
    MediaNetwork,
    MediaAborted,
    MediaSourceUnsupported,
    AutoplayBlocked,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ResolveNotFound => "resolve_not_found",
            FailureKind::ResolvePermissionDenied => "resolve_permission_denied",
            FailureKind::LoadTimeout => "load_timeout",
            FailureKind::MediaDecode => "media_decode",
            FailureKind::MediaNetwork => "media_network",
            FailureKind::MediaAborted => "media_aborted",
            FailureKind::MediaSourceUnsupported => "media_source_unsupported",
            FailureKind::AutoplayBlocked => "autoplay_blocked",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Message shown to the listener. Never includes URLs or storage paths.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::ResolveNotFound => "This song's audio file could not be found.",
            FailureKind::ResolvePermissionDenied => {
                "You don't have permission to play this song."
            }
            FailureKind::LoadTimeout => "The song took too long to load. Check your connection.",
            FailureKind::MediaDecode => "The audio file is damaged or in an unreadable format.",
            FailureKind::MediaNetwork => "A network error interrupted playback.",
            FailureKind::MediaAborted => "Loading the song was interrupted.",
            FailureKind::MediaSourceUnsupported => "This audio format is not supported.",
            FailureKind::AutoplayBlocked => "Playback was blocked. Press play to start listening.",
            FailureKind::Unknown => "Something went wrong while playing this song.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed attempt to load or start a track.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackFailure {
    // ========================================================================
    // Resolution
    // ========================================================================
    #[error("Audio object not found: {0}")]
    ResolveNotFound(String),

    #[error("Signed URL issuance rejected: {0}")]
    ResolvePermissionDenied(String),

    // ========================================================================
    // Media output
    // ========================================================================
    /// Source never became playable.
    #[error("Media not ready after {0:?}")]
    LoadTimeout(Duration),

    #[error("Media decode error: {0}")]
    MediaDecode(String),

    #[error("Media network error: {0}")]
    MediaNetwork(String),

    #[error("Media load aborted: {0}")]
    MediaAborted(String),

    #[error("Media source not supported: {0}")]
    MediaSourceUnsupported(String),

    /// Host refused `play()` until the user interacts.
    #[error("Autoplay blocked: {0}")]
    AutoplayBlocked(String),

    // ========================================================================
    // Fallback
    // ========================================================================
    #[error("Playback failed: {0}")]
    Unknown(String),
}

impl PlaybackFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            PlaybackFailure::ResolveNotFound(_) => FailureKind::ResolveNotFound,
            PlaybackFailure::ResolvePermissionDenied(_) => FailureKind::ResolvePermissionDenied,
            PlaybackFailure::LoadTimeout(_) => FailureKind::LoadTimeout,
            PlaybackFailure::MediaDecode(_) => FailureKind::MediaDecode,
            PlaybackFailure::MediaNetwork(_) => FailureKind::MediaNetwork,
            PlaybackFailure::MediaAborted(_) => FailureKind::MediaAborted,
            PlaybackFailure::MediaSourceUnsupported(_) => FailureKind::MediaSourceUnsupported,
            PlaybackFailure::AutoplayBlocked(_) => FailureKind::AutoplayBlocked,
            PlaybackFailure::Unknown(_) => FailureKind::Unknown,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// Returns `true` if the controller may schedule another attempt.
    ///
    /// Autoplay rejections fail identically until the user acts, so they are
    /// terminal straight away.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PlaybackFailure::AutoplayBlocked(_))
    }

    /// Returns `false` when an explicit retry cannot change the outcome.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackFailure::ResolveNotFound(_) | PlaybackFailure::MediaSourceUnsupported(_)
        )
    }

    /// Classify a native media error code.
    pub fn from_media_code(code: MediaErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            MediaErrorCode::Aborted => PlaybackFailure::MediaAborted(message),
            MediaErrorCode::Network => PlaybackFailure::MediaNetwork(message),
            MediaErrorCode::Decode => PlaybackFailure::MediaDecode(message),
            MediaErrorCode::SourceNotSupported => PlaybackFailure::MediaSourceUnsupported(message),
            MediaErrorCode::Unknown(_) => PlaybackFailure::Unknown(message),
        }
    }
}

impl From<MediaError> for PlaybackFailure {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotAllowed(msg) => PlaybackFailure::AutoplayBlocked(msg),
            MediaError::Media { code, message } => PlaybackFailure::from_media_code(code, message),
            MediaError::Other(msg) => PlaybackFailure::Unknown(msg),
        }
    }
}

impl From<ResolveError> for PlaybackFailure {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(path) => PlaybackFailure::ResolveNotFound(path),
            ResolveError::PermissionDenied(path) => PlaybackFailure::ResolvePermissionDenied(path),
            ResolveError::Other(msg) => PlaybackFailure::Unknown(msg),
        }
    }
}

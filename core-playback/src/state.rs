//! Observable playback state.

use crate::error::{FailureKind, PlaybackFailure};
use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coarse player status derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

/// Error shown to the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackErrorInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&PlaybackFailure> for PlaybackErrorInfo {
    fn from(failure: &PlaybackFailure) -> Self {
        Self {
            kind: failure.kind(),
            message: failure.user_message().to_string(),
        }
    }
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_track: Option<Arc<Track>>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub error: Option<PlaybackErrorInfo>,
    /// Seconds.
    pub elapsed: f64,
    /// Seconds; 0 until metadata arrives.
    pub duration: f64,
    /// Percent in `0.0..=100.0`.
    pub progress: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub auto_advance: bool,
    pub queue_position: Option<usize>,
    pub queue_len: usize,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            is_loading: false,
            error: None,
            elapsed: 0.0,
            duration: 0.0,
            progress: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            auto_advance: false,
            queue_position: None,
            queue_len: 0,
        }
    }
}

impl PlaybackState {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn status(&self) -> PlayerStatus {
        if self.error.is_some() {
            PlayerStatus::Error
        } else if self.is_loading {
            PlayerStatus::Loading
        } else if self.is_playing {
            PlayerStatus::Playing
        } else if self.current_track.is_some() && self.elapsed > 0.0 {
            PlayerStatus::Paused
        } else {
            PlayerStatus::Idle
        }
    }

    /// Reset position fields for a freshly selected track.
    pub(crate) fn reset_position(&mut self) {
        self.elapsed = 0.0;
        self.progress = 0.0;
    }
}

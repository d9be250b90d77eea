//! Track model.

use serde::{Deserialize, Serialize};

/// Where a track's audio lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AudioRef {
    /// Object path in remote storage, resolved through the `TrackResolver`.
    Path(String),
    /// Already playable URL; the resolver is skipped.
    Url(String),
}

/// A playable audio item.
///
/// Tracks are immutable. The controller swaps the current track for a new
/// value when it learns more (e.g. the duration from media metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Seconds, if known.
    #[serde(default)]
    pub duration: Option<f64>,
    pub audio: AudioRef,
    /// Resolution must produce a time-limited signed URL.
    #[serde(default)]
    pub signed: bool,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio: AudioRef,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover: None,
            album: None,
            duration: None,
            audio,
            signed: false,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Copy of this track with `duration` filled in.
    pub fn with_duration(&self, duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..self.clone()
        }
    }
}

//! Ordered play queue with a non-wrapping cursor.

use crate::error::{PlaybackError, Result};
use crate::track::Track;
use std::sync::Arc;

/// Tracks in play order plus the current position.
///
/// `position` is `None` exactly when the queue is empty; otherwise it points
/// at a valid index. Queues are replaced wholesale, never spliced.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Arc<Track>>,
    position: Option<usize>,
}

impl Queue {
    /// Build a queue positioned at `index`.
    pub fn new(tracks: Vec<Arc<Track>>, index: usize) -> Result<Self> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        if index >= tracks.len() {
            return Err(PlaybackError::InvalidQueueIndex {
                index,
                len: tracks.len(),
            });
        }

        Ok(Self {
            tracks,
            position: Some(index),
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn current(&self) -> Option<&Arc<Track>> {
        self.position.and_then(|pos| self.tracks.get(pos))
    }

    pub fn has_next(&self) -> bool {
        matches!(self.position, Some(pos) if pos + 1 < self.tracks.len())
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.position, Some(pos) if pos > 0)
    }

    /// Move forward one track. Returns `None` at the end.
    pub fn advance(&mut self) -> Option<Arc<Track>> {
        if !self.has_next() {
            return None;
        }
        let next = self.position.map_or(0, |pos| pos + 1);
        self.position = Some(next);
        self.tracks.get(next).cloned()
    }

    /// Move back one track. Returns `None` at the start.
    pub fn retreat(&mut self) -> Option<Arc<Track>> {
        if !self.has_previous() {
            return None;
        }
        let prev = self.position.map_or(0, |pos| pos - 1);
        self.position = Some(prev);
        self.tracks.get(prev).cloned()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.position = None;
    }
}

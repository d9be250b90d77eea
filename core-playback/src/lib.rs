//! # Playback Module
//!
//! The playback controller and its model types.
//!
//! ## Overview
//!
//! This module handles:
//! - Driving the host's single media output (`bridge_traits::MediaHost`)
//! - Resolving stored audio paths into playable URLs, with an LRU of resolved URLs
//! - Load retries, readiness timeouts and failure classification
//! - A non-wrapping play queue with optional auto-advance
//! - Observable state through a `tokio::sync::watch` channel

pub mod config;
pub mod controller;
pub mod error;
pub mod path;
pub mod queue;
pub mod state;
pub mod track;
pub mod url_cache;

pub use config::PlaybackConfig;
pub use controller::PlaybackController;
pub use error::{FailureKind, PlaybackError, PlaybackFailure, Result};
pub use queue::Queue;
pub use state::{PlaybackErrorInfo, PlaybackState, PlayerStatus};
pub use track::{AudioRef, Track};
pub use url_cache::UrlCache;

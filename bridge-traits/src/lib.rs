//! # Host Bridge Traits
//!
//! Contracts between the player core and the host platform.
//!
//! ## Overview
//!
//! The core owns playback logic but never touches a concrete audio element,
//! storage SDK or logger. Each capability below is a trait the host
//! implements (web, desktop, mobile) and injects through
//! `core_runtime::config::CoreConfig`.
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaHost`](playback::MediaHost) - The single media-output handle: source, transport, events
//!
//! ### Storage
//! - [`TrackResolver`](storage::TrackResolver) - Turns stored audio paths into public or signed URLs
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Host operations that can fail report [`BridgeError`](error::BridgeError),
//! except where the playback core needs to classify the failure: `play()`
//! returns [`MediaError`](playback::MediaError) and resolution returns
//! [`ResolveError`](storage::ResolveError).
//!
//! ## Thread Safety
//!
//! On native targets every bridge is `Send + Sync` so it can be shared across
//! async tasks. On `wasm32` the bounds are dropped (see [`platform`]).

pub mod error;
pub mod platform;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use playback::{
    MediaCallback, MediaError, MediaErrorCode, MediaEvent, MediaEventKind, MediaHost,
};
pub use storage::{ResolveError, TrackResolver};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};

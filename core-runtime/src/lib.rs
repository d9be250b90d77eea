//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the player core:
//! - Logging and tracing setup
//! - Configuration and bridge injection
//! - Event bus for playback and queue notifications
//!
//! ## Overview
//!
//! Hosts build a [`config::CoreConfig`] with their bridge implementations,
//! optionally call [`logging::init_logging`], and hand the config to the
//! playback controller. Everything the controller announces flows through
//! [`events::EventBus`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

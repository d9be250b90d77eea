//! Workspace facade crate.
//!
//! Re-exports the playback controller, its runtime and the host bridge
//! traits so host applications can depend on `player-workspace` alone.

pub use bridge_traits as bridge;

#[cfg(feature = "playback")]
pub use core_playback as playback;

#[cfg(feature = "playback")]
pub use core_runtime as runtime;

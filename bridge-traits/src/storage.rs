//! Remote storage abstraction for audio objects.
//!
//! The player never talks to a storage backend directly. Hosts provide a
//! [`TrackResolver`] that turns a normalised object path into a URL the
//! [`MediaHost`](crate::playback::MediaHost) can fetch: either a public URL
//! or a time-limited signed one.

use crate::platform::PlatformSendSync;
use thiserror::Error;

/// Failure reported by a [`TrackResolver`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No object exists at the requested path.
    #[error("Audio object not found: {0}")]
    NotFound(String),

    /// The backend refused to issue a (signed) URL for the object.
    #[error("Permission denied for audio object: {0}")]
    PermissionDenied(String),

    #[error("Resolver failure: {0}")]
    Other(String),
}

/// Resolves stored audio objects into playable URLs.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{ResolveError, TrackResolver};
///
/// struct PublicBucket { base: String }
///
/// #[async_trait::async_trait]
/// impl TrackResolver for PublicBucket {
///     async fn resolve(&self, path: &str, signed: bool) -> Result<String, ResolveError> {
///         if signed {
///             return Err(ResolveError::PermissionDenied(path.to_string()));
///         }
///         Ok(format!("{}/{}", self.base, path))
///     }
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait TrackResolver: PlatformSendSync {
    /// Resolve `path` (already normalised by the caller). When `signed` is
    /// set the resolver must issue a time-limited URL.
    async fn resolve(&self, path: &str, signed: bool) -> Result<String, ResolveError>;
}

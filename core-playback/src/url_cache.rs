//! In-memory cache of resolved track URLs.
//!
//! Replaying a track, or stepping back to one, should not hit the storage
//! backend again while the URL it issued is still usable. Public URLs are
//! kept until evicted; signed URLs expire after their usable lifetime,
//! measured on the injected [`Clock`].

use bridge_traits::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: String,
    signed: bool,
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    expires_at: Option<DateTime<Utc>>,
}

/// LRU of resolved URLs keyed by normalised path and signed flag.
pub struct UrlCache {
    entries: Mutex<LruCache<CacheKey, CachedUrl>>,
    clock: Arc<dyn Clock>,
    signed_lifetime: ChronoDuration,
}

impl UrlCache {
    pub fn new(capacity: usize, signed_lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let signed_lifetime =
            ChronoDuration::from_std(signed_lifetime).unwrap_or_else(|_| ChronoDuration::zero());

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
            signed_lifetime,
        }
    }

    /// Cached URL for `path`, if present and not expired.
    pub fn get(&self, path: &str, signed: bool) -> Option<String> {
        let key = CacheKey {
            path: path.to_string(),
            signed,
        };
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => entry.expires_at.is_some_and(|at| now >= at),
        };

        if expired {
            trace!(path = %path, "Signed URL expired, dropping from cache");
            entries.pop(&key);
            return None;
        }

        entries.get(&key).map(|entry| entry.url.clone())
    }

    pub fn insert(&self, path: &str, signed: bool, url: String) {
        let expires_at = signed.then(|| self.clock.now() + self.signed_lifetime);
        self.entries.lock().put(
            CacheKey {
                path: path.to_string(),
                signed,
            },
            CachedUrl { url, expires_at },
        );
    }

    /// Forget the URL for `path`, e.g. after the media output failed on it.
    pub fn remove(&self, path: &str, signed: bool) {
        self.entries.lock().pop(&CacheKey {
            path: path.to_string(),
            signed,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for UrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlCache")
            .field("len", &self.len())
            .field("signed_lifetime", &self.signed_lifetime)
            .finish()
    }
}

//! Single-flight fetch cache.
//!
//! Entries hold a shared future rather than a finished value, so a second
//! request for a file that is still being downloaded waits on the first
//! download instead of starting its own. Completed entries live for the TTL;
//! failed fetches are evicted as soon as they resolve.

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::content::FetchedContent;
use crate::error::LinkError;
use crate::link::SourceKey;

pub type FetchResult = Result<Arc<FetchedContent>, LinkError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Cache entry with expiration.
struct CacheEntry {
    fetch: SharedFetch,
    inserted_at: Instant,
    /// Distinguishes a replaced entry from the one a failing caller saw.
    generation: u64,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

pub struct FetchCache {
    entries: Mutex<LruCache<SourceKey, CacheEntry>>,
    ttl: Duration,
    generation: AtomicU64,
}

impl FetchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached or in-flight result for `key`, or start `load` and
    /// publish it before awaiting so concurrent callers coalesce onto it.
    pub async fn get_or_fetch<F>(&self, key: &SourceKey, load: F) -> FetchResult
    where
        F: FnOnce() -> BoxFuture<'static, Result<FetchedContent, LinkError>>,
    {
        let (fetch, generation) = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    debug!(source = %key, "Fetch cache hit");
                    (entry.fetch.clone(), entry.generation)
                }
                _ => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let fetch = load().map(|r| r.map(Arc::new)).boxed().shared();
                    entries.put(
                        key.clone(),
                        CacheEntry {
                            fetch: fetch.clone(),
                            inserted_at: Instant::now(),
                            generation,
                        },
                    );
                    (fetch, generation)
                }
            }
        };

        let result = fetch.await;
        if result.is_err() {
            self.evict(key, generation);
        }
        result
    }

    fn evict(&self, key: &SourceKey, generation: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.peek(key).is_some_and(|e| e.generation == generation) {
            entries.pop(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

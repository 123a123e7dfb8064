use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::traits::BlobStore;

/// Cache-through decorator: fronts a slow or remote origin store with a
/// cheaper cache store.
///
/// The origin is authoritative for everything. Writes go to the origin
/// first; only a successful origin write is followed by a best-effort cache
/// write. Reads try the cache first and fall through to the origin on any
/// cache failure, populating the cache afterwards so the next read can hit.
/// `list_all` never consults the cache, which may hold a stale subset of
/// keys.
///
/// Cache-layer failures are never surfaced to callers: a caching layer that
/// breaks must not make the system less correct than having no cache at all.
/// They are logged at `warn` and swallowed. Origin failures always
/// propagate.
///
/// There is no eviction, TTL, or size bound; the cache store grows until
/// [`clear_cache`] is called.
///
/// [`clear_cache`]: CachingStore::clear_cache
pub struct CachingStore {
    cache: Arc<dyn BlobStore>,
    origin: Arc<dyn BlobStore>,
    /// Keys ever written to or served from the cache. Bookkeeping only.
    cached_keys: RwLock<HashSet<String>>,
    /// Reads served from the cache since construction or last clear.
    hits: AtomicU64,
}

impl CachingStore {
    /// Create a caching store over `cache` and `origin`.
    pub fn new(cache: Arc<dyn BlobStore>, origin: Arc<dyn BlobStore>) -> Self {
        Self {
            cache,
            origin,
            cached_keys: RwLock::new(HashSet::new()),
            hits: AtomicU64::new(0),
        }
    }

    /// Number of reads served from the cache since construction or the last
    /// [`clear_cache`].
    ///
    /// [`clear_cache`]: CachingStore::clear_cache
    pub fn cache_hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of distinct keys ever written to or served from the cache.
    pub fn cached_key_count(&self) -> usize {
        self.cached_keys.read().expect("lock poisoned").len()
    }

    /// Best-effort wipe of the cache store and reset of hit bookkeeping.
    ///
    /// The cache contract has no bulk clear, so every cache key is
    /// overwritten with empty bytes. Failures are swallowed; the origin is
    /// untouched.
    pub async fn clear_cache(&self) {
        match self.cache.list_all().await {
            Ok(keys) => {
                for key in keys {
                    if let Err(e) = self.cache.write(&key, &[]).await {
                        tracing::warn!(key = %key, error = %e, "cache clear: failed to delete key");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache clear: failed to list cache keys");
            }
        }
        self.cached_keys.write().expect("lock poisoned").clear();
        self.hits.store(0, Ordering::Relaxed);
    }

    fn mark_cached(&self, key: &str) {
        self.cached_keys
            .write()
            .expect("lock poisoned")
            .insert(key.to_string());
    }
}

#[async_trait]
impl BlobStore for CachingStore {
    /// The cache is never a source of truth for enumeration.
    async fn list_all(&self) -> StoreResult<Vec<String>> {
        self.origin.list_all().await
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        // Any cache failure, including NotFound, falls through to origin.
        match self.cache.read(key).await {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.mark_cached(key);
                return Ok(data);
            }
            Err(e) => {
                tracing::debug!(key, error = %e, "cache miss, falling through to origin");
            }
        }

        let data = self.origin.read(key).await?;

        // Best-effort population so the next read can hit.
        match self.cache.write(key, &data).await {
            Ok(()) => self.mark_cached(key),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to populate cache after origin read");
            }
        }

        Ok(data)
    }

    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        // Origin is authoritative: its failure aborts the operation.
        self.origin.write(key, data).await?;

        match self.cache.write(key, data).await {
            Ok(()) => self.mark_cached(key),
            Err(e) => {
                tracing::warn!(key, error = %e, "cache write failed, origin write kept");
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for CachingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingStore")
            .field("cache_hits", &self.cache_hit_count())
            .field("cached_keys", &self.cached_key_count())
            .finish()
    }
}

//! Fetch-through cache manager
//!
//! Provides a `CacheManager` that answers reads from a durable namespace when
//! the stored entry is still fresh and otherwise calls a caller-supplied fetch
//! function, storing its result before returning it.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::store::{CacheEntry, FileSlotStore, MemorySlotStore, NamespaceMap, NamespaceStore, SlotStore};
use super::SYMBOL_NAMESPACES;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Maximum age of a cache entry, in milliseconds
///
/// An entry is fresh while `now - timestamp < ttl`. A zero or negative TTL
/// never considers anything fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ttl(i64);

impl Ttl {
    /// TTL used when a call site does not pick one (5 hours)
    pub const DEFAULT: Ttl = Ttl::from_hours(5);

    pub const fn from_millis(millis: i64) -> Self {
        Ttl(millis)
    }

    pub const fn from_minutes(minutes: i64) -> Self {
        Ttl(minutes * MILLIS_PER_MINUTE)
    }

    pub const fn from_hours(hours: i64) -> Self {
        Ttl(hours * MILLIS_PER_HOUR)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Whether an entry written at `written_at` is still fresh at `now`
    pub fn is_fresh(self, written_at: i64, now: i64) -> bool {
        self.0 > 0 && now.saturating_sub(written_at) < self.0
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::DEFAULT
    }
}

/// Fetch-through cache over durable namespaces
///
/// Namespaces are created lazily on first write. There is no locking and no
/// de-duplication of concurrent misses: each call loads the namespace, may
/// fetch, and rewrites the whole namespace, so the last persist wins.
#[derive(Debug, Clone)]
pub struct CacheManager<S = FileSlotStore, C = SystemClock> {
    store: NamespaceStore<S>,
    clock: C,
}

impl CacheManager<FileSlotStore, SystemClock> {
    /// Creates a CacheManager using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined.
    pub fn new() -> Option<Self> {
        FileSlotStore::new().map(|slots| Self::with_parts(slots, SystemClock))
    }

    /// Creates a CacheManager storing namespaces under a custom directory
    pub fn with_dir(cache_dir: impl Into<std::path::PathBuf>) -> Self {
        Self::with_parts(FileSlotStore::with_dir(cache_dir), SystemClock)
    }
}

impl CacheManager<MemorySlotStore, SystemClock> {
    /// Creates a CacheManager that only lives as long as the process
    pub fn in_memory() -> Self {
        Self::with_parts(MemorySlotStore::new(), SystemClock)
    }
}

impl<S: SlotStore, C: Clock> CacheManager<S, C> {
    /// Creates a CacheManager from an explicit slot store and clock
    pub fn with_parts(slots: S, clock: C) -> Self {
        Self {
            store: NamespaceStore::new(slots),
            clock,
        }
    }

    /// The namespace store backing this cache
    pub fn store(&self) -> &NamespaceStore<S> {
        &self.store
    }

    /// Returns the cached value for `key` in `namespace` if fresh, otherwise
    /// awaits `fetch`, stores its result and returns it
    ///
    /// # Arguments
    /// * `namespace` - Name of the namespace (e.g., "dividendCache")
    /// * `key` - Entry key within the namespace (e.g., a symbol)
    /// * `fetch` - Produces the value on a miss or stale entry
    /// * `ttl` - Maximum age of a usable entry
    ///
    /// # Returns
    /// * `Ok(T)` from the cache or from `fetch`
    /// * `Err(E)` exactly as returned by `fetch`; the namespace is not touched
    ///
    /// A stored entry that no longer decodes as `T` counts as a miss. A
    /// failed write is logged and the fetched value is still returned.
    pub async fn get_cached_or_fetch<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        fetch: F,
        ttl: Ttl,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug_assert!(!namespace.is_empty(), "cache namespace must not be empty");

        let mut cache = self.store.load(namespace);
        let now = self.clock.now_millis();

        if let Some(entry) = cache.get(key) {
            if ttl.is_fresh(entry.timestamp, now) {
                match T::deserialize(&entry.data) {
                    Ok(data) => {
                        debug!(namespace, key, "Cache hit");
                        return Ok(data);
                    }
                    Err(e) => {
                        warn!(namespace, key, error = %e, "Cached entry has unexpected shape, refetching");
                    }
                }
            }
        }

        let data = fetch().await?;

        match serde_json::to_value(&data) {
            Ok(value) => {
                cache.insert(
                    key.to_string(),
                    CacheEntry {
                        data: value,
                        timestamp: now,
                    },
                );
                self.store.persist(namespace, &cache);
                info!(namespace, key, "Fetched from API and saved to cache");
            }
            Err(e) => {
                error!(namespace, key, error = %e, "Failed to encode fetched value for cache");
            }
        }

        Ok(data)
    }

    /// [`get_cached_or_fetch`](Self::get_cached_or_fetch) with [`Ttl::DEFAULT`]
    pub async fn get_cached_or_fetch_default<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_cached_or_fetch(namespace, key, fetch, Ttl::DEFAULT)
            .await
    }

    /// Removes `key` from each of the given namespaces
    ///
    /// Only namespaces that actually held the key are rewritten. The loop is
    /// not atomic across namespaces. Returns the namespaces that were changed.
    pub fn invalidate<I>(&self, key: &str, namespaces: I) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut changed = Vec::new();

        for namespace in namespaces {
            let namespace = namespace.as_ref();
            let mut cache = self.store.load(namespace);
            if cache.remove(key).is_some() {
                self.store.persist(namespace, &cache);
                debug!(namespace, key, "Invalidated cache entry");
                changed.push(namespace.to_string());
            }
        }

        changed
    }

    /// Drops the per-symbol entries (dividends and company profile)
    pub fn invalidate_symbol(&self, symbol: &str) -> Vec<String> {
        self.invalidate(symbol, SYMBOL_NAMESPACES)
    }

    /// Returns the raw stored entry without checking freshness
    pub fn peek(&self, namespace: &str, key: &str) -> Option<CacheEntry> {
        self.store.load(namespace).remove(key)
    }

    /// Returns every stored entry of a namespace
    pub fn entries(&self, namespace: &str) -> NamespaceMap {
        self.store.load(namespace)
    }

    /// Removes a whole namespace from durable storage
    pub fn clear(&self, namespace: &str) -> bool {
        self.store.clear(namespace)
    }
}

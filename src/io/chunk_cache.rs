use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::{Notify, RwLock};
use tracing::debug;
use zarrs::storage::byte_range::ByteRange;
use zarrs::storage::{AsyncReadableStorageTraits, StorageError, StoreKey};

use super::ChunkStore;
use crate::error::IoError;

type FetchResult = Result<Option<Bytes>, IoError>;

/// Read-through cache that wraps any ChunkStore and serves it to `zarrs` as
/// async readable storage.
///
/// Remote chunk fetches are high latency and a viewer revisits the same
/// region many times while panning, so every object fetched through the
/// cache is kept for the lifetime of the opened pyramid. Byte-range reads
/// are answered by slicing the cached object.
///
/// Features:
/// - Unbounded by default, optional LRU bound on the number of entries
/// - Absent keys are cached too (they resolve to the fill value)
/// - Singleflight: concurrent requests for the same key share one fetch
/// - Failed fetches are never cached
/// - No lock is held while a fetch is in progress
pub struct ChunkCache<S> {
    /// The underlying store
    inner: Arc<S>,
    /// Cached objects indexed by key
    cache: RwLock<LruCache<String, Option<Bytes>>>,
    /// In-flight fetches for singleflight pattern
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
    stats: Counters,
}

/// State shared between the task fetching a key and the tasks waiting on it.
struct InFlight {
    notify: Notify,
    /// Set by the leader before it leaves the in-flight map
    result: OnceLock<FetchResult>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to wait for or perform a fetch
    pub misses: u64,
    /// Fetches issued to the underlying store
    pub fetches: u64,
}

/// Removes the in-flight entry and wakes waiters when the leader finishes,
/// including when its future is dropped before the fetch completes.
struct LeaderGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<InFlight>>>,
    key: &'a str,
    state: Arc<InFlight>,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if in_flight
                .get(self.key)
                .is_some_and(|s| Arc::ptr_eq(s, &self.state))
            {
                in_flight.remove(self.key);
            }
        }
        self.state.notify.notify_waiters();
    }
}

impl<S: ChunkStore> ChunkCache<S> {
    /// Create a new unbounded ChunkCache wrapping the given store.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, None)
    }

    /// Create a new ChunkCache holding at most `capacity` entries.
    ///
    /// `None` keeps every entry; `Some(n)` evicts least-recently-used entries
    /// beyond `n`.
    pub fn with_capacity(inner: S, capacity: Option<NonZeroUsize>) -> Self {
        let cache = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            inner: Arc::new(inner),
            cache: RwLock::new(cache),
            in_flight: Mutex::new(HashMap::new()),
            stats: Counters::default(),
        }
    }

    /// Get the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Check if a key is cached without updating LRU order.
    pub async fn contains(&self, key: &str) -> bool {
        self.cache.read().await.contains(key)
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Current counter values.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
        }
    }

    /// Get an object, fetching it from the underlying store on a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, IoError> {
        self.get_or_fetch(key).await
    }

    /// Get an object from cache or fetch it from the underlying store.
    ///
    /// Implements the singleflight pattern: if multiple tasks request the same
    /// key concurrently, only one fetch is performed and all tasks share the
    /// result, including an error.
    async fn get_or_fetch(&self, key: &str) -> FetchResult {
        let mut counted = false;
        loop {
            // Fast path: check cache
            {
                let mut cache = self.cache.write().await;
                if let Some(data) = cache.get(key) {
                    if !counted {
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(data.clone());
                }
            }
            if !counted {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                counted = true;
            }

            // Slow path: join an in-flight fetch or become leader
            let (state, leader) = {
                let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                match in_flight.get(key) {
                    Some(state) => (state.clone(), false),
                    None => {
                        let state = Arc::new(InFlight {
                            notify: Notify::new(),
                            result: OnceLock::new(),
                        });
                        in_flight.insert(key.to_string(), state.clone());
                        (state, true)
                    }
                }
            };

            if leader {
                return self.lead_fetch(key, state).await;
            }

            // Register for the wakeup before checking the result so a leader
            // finishing in between cannot be missed.
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = state.result.get() {
                return result.clone();
            }
            if !self.is_in_flight(key, &state) {
                // Leader was dropped before producing a result
                continue;
            }

            notified.await;

            if let Some(result) = state.result.get() {
                return result.clone();
            }
            // Leader was cancelled, retry (possibly as the new leader)
        }
    }

    /// Fetch `key` as the singleflight leader and publish the result.
    async fn lead_fetch(&self, key: &str, state: Arc<InFlight>) -> FetchResult {
        let guard = LeaderGuard {
            in_flight: &self.in_flight,
            key,
            state,
        };

        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(store = self.inner.identifier(), key, "fetching chunk");
        let result = self.inner.get(key).await;

        if let Ok(ref data) = result {
            let mut cache = self.cache.write().await;
            cache.put(key.to_string(), data.clone());
        } else {
            debug!(key, "chunk fetch failed, not caching");
        }

        let _ = guard.state.result.set(result.clone());
        drop(guard);

        result
    }

    fn is_in_flight(&self, key: &str, state: &Arc<InFlight>) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.get(key).is_some_and(|s| Arc::ptr_eq(s, state))
    }
}

fn storage_error(err: IoError) -> StorageError {
    StorageError::Other(err.to_string())
}

#[async_trait]
impl<S: ChunkStore + 'static> AsyncReadableStorageTraits for ChunkCache<S> {
    async fn get(&self, key: &StoreKey) -> Result<Option<Bytes>, StorageError> {
        self.get_or_fetch(key.as_str()).await.map_err(storage_error)
    }

    async fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let Some(value) = self.get_or_fetch(key.as_str()).await.map_err(storage_error)? else {
            return Ok(None);
        };
        let size = value.len() as u64;
        byte_ranges
            .iter()
            .map(|range| {
                let (start, end) = (range.start(size), range.end(size));
                if start > end || end > size {
                    return Err(StorageError::Other(format!(
                        "byte range {}..{} outside {} ({} bytes)",
                        start, end, key, size
                    )));
                }
                Ok(value.slice(start as usize..end as usize))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let value = self.get_or_fetch(key.as_str()).await.map_err(storage_error)?;
        Ok(value.map(|v| v.len() as u64))
    }
}

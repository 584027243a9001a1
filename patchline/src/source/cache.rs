//! TTL cache with a single per-source fetch lock.

use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, MutexGuard};

/// Upper bound on cached entries per source.
const MAX_ENTRIES: u64 = 1024;

/// Cache of fetched data for one source.
///
/// Entries expire `ttl` after insertion. All misses funnel through one
/// lock, so concurrent requests for different keys on the same source still
/// reach the network one at a time. Whoever acquires the lock must look in
/// the cache again before fetching: the previous holder may have just
/// filled it.
pub struct FetchCache<K, V> {
    entries: Cache<K, V>,
    fetch_lock: Mutex<()>,
}

impl<K, V> FetchCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            fetch_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value).await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Acquire the fetch lock for callers that need custom miss handling.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.fetch_lock.lock().await
    }

    /// Return the cached value or run `fetch` under the fetch lock.
    ///
    /// A `None` from `fetch` is not cached, so the next call tries again.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        if let Some(value) = self.entries.get(&key).await {
            return Some(value);
        }

        let _guard = self.fetch_lock.lock().await;

        // Filled by whoever held the lock before us.
        if let Some(value) = self.entries.get(&key).await {
            return Some(value);
        }

        let value = fetch().await?;
        self.entries.insert(key, value.clone()).await;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_second_call_within_ttl_is_served_from_cache() {
        let cache: FetchCache<u32, String> = FetchCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_fetch(1, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Some("v".to_string()) }
                })
                .await;
            assert_eq!(value.as_deref(), Some("v"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_is_not_cached() {
        let cache: FetchCache<u32, String> = FetchCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_fetch(1, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { None }
                })
                .await;
            assert!(value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let cache: Arc<FetchCache<u32, u32>> = Arc::new(FetchCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(7, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Some(42)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_refetch() {
        let cache: FetchCache<u32, u32> = FetchCache::new(Duration::from_secs(60));
        cache.insert(1, 10).await;
        assert_eq!(cache.get(&1).await, Some(10));

        cache.invalidate_all();
        assert_eq!(cache.get(&1).await, None);
    }
}

use dashmap::DashMap;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Concurrent TTL cache for read-mostly provider data (weather lookups).
///
/// Entries are stamped at insert time and dropped lazily on read.
pub struct TtlCache<K, V> {
    entries: DashMap<K, (Instant, V)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key)?;
        let (stamped_at, value) = hit.value();
        if stamped_at.elapsed() > self.ttl {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (stamped_at, _)| stamped_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded LRU cache with TTL stamps, used for prior-analysis comparison
/// lookups so repeated farm runs do not hammer the persistence store.
pub struct HistoryCache<V> {
    inner: Mutex<LruCache<String, (Instant, V)>>,
    ttl: Duration,
}

impl<V: Clone> HistoryCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some((stamped_at, _)) if stamped_at.elapsed() > self.ttl => {
                cache.pop(key);
                None
            }
            Some((_, value)) => Some(value.clone()),
            None => None,
        }
    }

    pub async fn insert(&self, key: String, value: V) {
        self.inner.lock().await.put(key, (Instant::now(), value));
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.lock().await.pop(key);
    }
}

//! Bounded in-memory TTL cache for normalized GET responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    /// Insertion order for capacity eviction. Overwrites keep the
    /// original position.
    order: VecDeque<String>,
    capacity: usize,
    default_ttl: Duration,
}

impl CacheInner {
    fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            default_ttl,
        }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let entry = self.map.get(key)?;
        if entry.is_expired(Instant::now()) {
            self.remove(key);
            return None;
        }
        Some(entry.body.clone())
    }

    fn insert(&mut self, key: String, body: String, ttl_override: Option<Duration>) {
        let ttl = ttl_override.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            body,
            stored_at: Instant::now(),
            ttl,
        };

        if self.map.insert(key.clone(), entry).is_some() {
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
        self.order.push_back(key);
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.map.remove(key).is_none() {
            return false;
        }
        self.order.retain(|entry| entry != key);
        true
    }

    fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Thread-safe bounded TTL cache.
///
/// `get` never returns data older than its TTL; expired entries are deleted
/// on read or swept by [`ResponseCache::purge_expired`]. At capacity the
/// earliest-inserted entry is evicted first (insertion order, not LRU).
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<tokio::sync::Mutex<CacheInner>>,
}

impl ResponseCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(CacheInner::new(
                capacity.max(1),
                default_ttl,
            ))),
        }
    }

    /// 100 entries, 5 minute TTL.
    pub fn with_defaults() -> Self {
        Self::new(100, Duration::from_secs(300))
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().await.get(key)
    }

    pub async fn insert(&self, key: String, body: String, ttl_override: Option<Duration>) {
        self.inner.lock().await.insert(key, body, ttl_override);
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.inner.lock().await.remove(key)
    }

    /// Sweep all expired entries; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.inner.lock().await.purge_expired()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

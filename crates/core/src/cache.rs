//! Process-wide response cache keyed by origin URL.
//!
//! Entries are only ever inserted after a complete, successful origin fetch,
//! so an aborted request can never leave a partial entry behind.

use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderMap, StatusCode};
use modproxy_api::CacheStats;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Last store or successful revalidation
    pub cached_at: Instant,
}

impl CacheEntry {
    pub fn new(url: impl Into<String>, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body,
            cached_at: Instant::now(),
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers
            .get(http::header::ETAG)
            .and_then(|v| v.to_str().ok())
    }
}

/// Bounded, insertion-ordered cache. The oldest entry is evicted first.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    /// Insertion order, guarded together with inserts so it matches `entries`
    order: Mutex<VecDeque<String>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        self.entries.get(url).map(|e| e.value().clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Insert or overwrite an entry, evicting the oldest ones past capacity.
    pub fn insert(&self, entry: CacheEntry) {
        let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        let url = entry.url.clone();
        if self.entries.insert(url.clone(), entry).is_none() {
            order.push_back(url);
        }

        while order.len() > self.capacity {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Evicted {} from response cache", oldest);
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        order.clear();
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

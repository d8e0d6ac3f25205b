//! Short-lived read cache for User Service responses.
//!
//! Keys have the shape `endpoint:address[:extra]` so every entry for an
//! address can be dropped after a write that changes it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(Instant::now()) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// Build a cache key. Addresses are compared case-insensitively.
pub fn cache_key(endpoint: &str, address: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{}:{}:{}", endpoint, address.to_lowercase(), extra),
        None => format!("{}:{}", endpoint, address.to_lowercase()),
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`. An entry is fresh strictly before `inserted_at + ttl`.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: evict
        self.entries.write().remove(key);
        None
    }

    pub fn insert(&self, key: String, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        // Clean expired entries occasionally
        if entries.len() > 512 {
            let ttl = self.ttl;
            entries.retain(|_, e| now.duration_since(e.inserted_at) < ttl);
        }
        entries.insert(key, CacheEntry { value, inserted_at: now });
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Drop every entry whose address component matches.
    pub fn invalidate_address(&self, address: &str) {
        let address = address.to_lowercase();
        self.entries
            .write()
            .retain(|key, _| key.split(':').nth(1) != Some(address.as_str()));
    }

    /// Drop every entry for an endpoint.
    pub fn invalidate_prefix(&self, endpoint: &str) {
        let prefix = format!("{}:", endpoint);
        self.entries
            .write()
            .retain(|key, _| key != endpoint && !key.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

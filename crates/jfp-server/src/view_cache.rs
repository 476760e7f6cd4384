//! Per-user TTL cache for merged view (library) listings.
//!
//! View merging fans out to every mapped backend, which is too expensive to
//! repeat on every page load; results are cached for a short TTL and
//! invalidated lazily on read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jfp_core::UserId;
use serde_json::Value;

const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct ViewCache {
    entries: Arc<DashMap<UserId, CacheEntry>>,
    ttl: Duration,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Return a cached value for `user_id`, if present and not expired. A
    /// hit returns a clone; the cache never hands out references.
    pub fn get(&self, user_id: UserId) -> Option<Value> {
        let entry = self.entries.get(&user_id)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(&user_id);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, user_id: UserId, value: Value) {
        self.entries.insert(
            user_id,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, user_id: UserId) {
        self.entries.remove(&user_id);
    }
}

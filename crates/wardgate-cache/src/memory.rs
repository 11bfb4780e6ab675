//! `DashMap`-backed cache with per-key time-to-live.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use wardgate_core::cache::CacheStore;
use wardgate_core::error::WardgateResult;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Shared in-process cache. Cloning yields another handle to the same
/// map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Number of live and not-yet-swept entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, key: &str, value: String, expires_at: Option<Instant>) {
        self.entries
            .insert(key.to_owned(), Entry { value, expires_at });
    }
}

impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> WardgateResult<Option<String>> {
        let now = Instant::now();
        let removed = self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        if removed.is_some() {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> WardgateResult<()> {
        self.insert(key, value, None);
        Ok(())
    }

    /// A TTL too large to represent as a deadline stores the entry
    /// without expiry.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> WardgateResult<()> {
        self.insert(key, value, Instant::now().checked_add(ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> WardgateResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

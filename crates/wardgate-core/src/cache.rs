//! Key-value cache abstraction behind the active-session index.
//!
//! Deliberately narrow so the backing store can be swapped (in-process
//! map, Redis, ...) and faked in tests.

use std::time::Duration;

use crate::error::WardgateResult;

pub trait CacheStore: Send + Sync {
    /// Value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = WardgateResult<Option<String>>> + Send;

    /// Store without expiry, replacing any existing value and TTL.
    fn set(&self, key: &str, value: String) -> impl Future<Output = WardgateResult<()>> + Send;

    /// Store with a time-to-live, replacing any existing value and TTL.
    fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = WardgateResult<()>> + Send;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = WardgateResult<()>> + Send;
}

//! Wardgate Cache — in-process [`CacheStore`] implementation.
//!
//! Expiry is lazy: an expired entry is dropped when it is next read,
//! and [`MemoryCache::purge_expired`] sweeps the rest.

mod memory;

pub use memory::MemoryCache;

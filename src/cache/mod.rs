//! Client-side caching for dashboard data.
//!
//! This module provides:
//! - A TTL-checked persistent cache over a durable key-value store
//! - A process-lifetime ephemeral cache for prefetched pages
//! - Per-domain adapters that optimize payloads before they are stored
//!
//! Cache failures never surface as errors: reads degrade to a miss and
//! writes report `false`.

mod adapter;
mod clock;
mod ephemeral;
mod persistent;
mod storage;
mod traits;

pub use adapter::DomainCache;
pub use clock::{Clock, SystemClock};
pub use ephemeral::EphemeralCache;
pub use persistent::{
  CacheStats, ClearTarget, EntryMeta, PersistentCache, SharedStore, DEFAULT_TTL, MAX_ENTRY_BYTES,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError, DEFAULT_QUOTA_BYTES};
pub use traits::{CacheDomain, CacheScope, CacheStatus, KeyParams};

#[cfg(test)]
pub use clock::ManualClock;

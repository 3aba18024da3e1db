//! TTL-checked cache over a durable key-value store.
//!
//! Entries are stored as JSON envelopes `{data, timestamp, ttlMs}`. Expired
//! or malformed entries are treated as absent and removed lazily when read.
//! Nothing in this module returns an error to the caller: failures degrade to
//! `None` / `false` and are logged.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::storage::KeyValueStore;

/// Default time-to-live for every cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Hard cap on a serialized entry.
pub const MAX_ENTRY_BYTES: usize = 2 * 1024 * 1024;

/// Only entries older than this are eligible for quota eviction.
const EVICTION_MIN_AGE_MS: i64 = 60 * 60 * 1000;

/// Upper bound on entries removed by one eviction pass.
const MAX_EVICTIONS_PER_PASS: usize = 3;

pub type SharedStore = Arc<dyn KeyValueStore>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry<T> {
  data: T,
  timestamp: i64,
  ttl_ms: u64,
}

impl<T> CacheEntry<T> {
  fn age_ms(&self, now_ms: i64) -> i64 {
    now_ms - self.timestamp
  }

  fn is_valid_at(&self, now_ms: i64) -> bool {
    self.age_ms(now_ms) < self.ttl_ms as i64
  }
}

/// What [`PersistentCache::clear`] should remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget<'a> {
  /// A single key.
  Key(&'a str),
  /// Every key in the store starting with the prefix.
  Prefix(&'a str),
  /// Every key in this cache's own namespace.
  Own,
}

/// Metadata about a valid entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
  /// Epoch milliseconds when the entry was written.
  pub timestamp: i64,
  pub ttl: Duration,
  pub age: Duration,
  /// Time left before the entry expires.
  pub remaining: Duration,
  /// Serialized size of the envelope in bytes.
  pub size_bytes: usize,
}

impl EntryMeta {
  pub fn cached_at(&self) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(self.timestamp).single()
  }
}

/// Aggregate numbers for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub namespace: String,
  pub entries: usize,
  pub valid: usize,
  pub expired: usize,
  pub corrupt: usize,
  pub bytes: usize,
}

/// Keyed cache with TTL expiry, a size guard and quota eviction.
///
/// Each instance owns a namespace prefix. `clear(ClearTarget::Own)` and quota
/// eviction only ever touch keys under that prefix, so several caches can
/// share one store.
#[derive(Clone)]
pub struct PersistentCache {
  store: SharedStore,
  namespace: String,
  ttl: Duration,
  max_entry_bytes: usize,
  clock: Arc<dyn Clock>,
}

impl PersistentCache {
  /// Create a cache for `namespace` over the given store.
  pub fn new(store: SharedStore, namespace: impl Into<String>) -> Self {
    Self {
      store,
      namespace: namespace.into(),
      ttl: DEFAULT_TTL,
      max_entry_bytes: MAX_ENTRY_BYTES,
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
    self.max_entry_bytes = max_entry_bytes;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn store(&self) -> &SharedStore {
    &self.store
  }

  pub fn now_ms(&self) -> i64 {
    self.clock.now_ms()
  }

  fn read_raw(&self, key: &str) -> Option<String> {
    match self.store.get_item(key) {
      Ok(raw) => raw,
      Err(e) => {
        debug!(key, error = %e, "Cache read failed");
        None
      }
    }
  }

  fn read_header(&self, key: &str) -> Option<(CacheEntry<IgnoredAny>, usize)> {
    let raw = self.read_raw(key)?;
    let entry = serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw).ok()?;
    Some((entry, raw.len()))
  }

  fn remove(&self, key: &str) -> bool {
    match self.store.remove_item(key) {
      Ok(()) => true,
      Err(e) => {
        debug!(key, error = %e, "Cache remove failed");
        false
      }
    }
  }

  /// Whether `key` holds an unexpired, well-formed entry. Never deletes.
  pub fn is_valid(&self, key: &str) -> bool {
    self
      .read_header(key)
      .map(|(entry, _)| entry.is_valid_at(self.now_ms()))
      .unwrap_or(false)
  }

  /// Read the data stored under `key`.
  ///
  /// Expired, malformed, or wrongly-typed entries are removed and reported
  /// as a miss.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    if !self.is_valid(key) {
      if self.read_raw(key).is_some() {
        debug!(key, "Removing expired or corrupt cache entry");
        self.remove(key);
      }
      return None;
    }

    let raw = self.read_raw(key)?;
    match serde_json::from_str::<CacheEntry<T>>(&raw) {
      Ok(entry) => {
        debug!(key, "Cache hit");
        Some(entry.data)
      }
      Err(e) => {
        debug!(key, error = %e, "Cache entry does not match requested type, removing");
        self.remove(key);
        None
      }
    }
  }

  /// Write `data` under `key` with the cache TTL or `ttl` if given.
  ///
  /// Returns false when the entry is oversized or the store rejected it;
  /// callers should then stop relying on the cache for this session.
  pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) -> bool {
    self.set_in(&self.namespace, key, data, ttl)
  }

  /// Like [`set`](Self::set), but a quota failure only evicts entries
  /// under `eviction_prefix`.
  pub fn set_in<T: Serialize>(
    &self,
    eviction_prefix: &str,
    key: &str,
    data: &T,
    ttl: Option<Duration>,
  ) -> bool {
    let ttl = ttl.unwrap_or(self.ttl);
    let entry = CacheEntry {
      data,
      timestamp: self.now_ms(),
      ttl_ms: ttl.as_millis() as u64,
    };

    let serialized = match serde_json::to_string(&entry) {
      Ok(s) => s,
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize cache entry");
        return false;
      }
    };

    if serialized.len() > self.max_entry_bytes {
      warn!(
        key,
        size = serialized.len(),
        limit = self.max_entry_bytes,
        "Cache entry too large, skipping write"
      );
      return false;
    }

    match self.store.set_item(key, &serialized) {
      Ok(()) => {
        debug!(key, size = serialized.len(), "Cache write");
        true
      }
      Err(e) if e.is_quota_exceeded() => {
        let evicted = self.evict_stale_under(eviction_prefix);
        warn!(key, evicted, error = %e, "Cache quota exceeded");
        false
      }
      Err(e) => {
        warn!(key, error = %e, "Cache write failed");
        false
      }
    }
  }

  /// Remove keys according to `target`. Returns how many keys were removed.
  pub fn clear(&self, target: ClearTarget<'_>) -> usize {
    let prefix = match target {
      ClearTarget::Key(key) => {
        return usize::from(self.read_raw(key).is_some() && self.remove(key));
      }
      ClearTarget::Prefix(prefix) => prefix,
      ClearTarget::Own => self.namespace.as_str(),
    };

    let keys = match self.store.keys_with_prefix(prefix) {
      Ok(keys) => keys,
      Err(e) => {
        warn!(prefix, error = %e, "Failed to list cache keys for clear");
        return 0;
      }
    };

    let removed = keys.iter().filter(|key| self.remove(key)).count();
    debug!(prefix, removed, "Cleared cache keys");
    removed
  }

  /// Drop up to three of the oldest entries older than an hour in this
  /// namespace. Returns the number removed.
  pub fn evict_stale(&self) -> usize {
    self.evict_stale_under(&self.namespace)
  }

  /// Eviction restricted to keys starting with `prefix`.
  pub fn evict_stale_under(&self, prefix: &str) -> usize {
    let keys = match self.store.keys_with_prefix(prefix) {
      Ok(keys) => keys,
      Err(e) => {
        warn!(prefix, error = %e, "Failed to list keys for eviction");
        return 0;
      }
    };

    let now = self.now_ms();
    let mut candidates: Vec<(i64, String)> = keys
      .into_iter()
      .filter_map(|key| {
        let (entry, _) = self.read_header(&key)?;
        (entry.age_ms(now) > EVICTION_MIN_AGE_MS).then_some((entry.timestamp, key))
      })
      .collect();
    candidates.sort();

    candidates
      .into_iter()
      .take(MAX_EVICTIONS_PER_PASS)
      .filter(|(_, key)| self.remove(key))
      .count()
  }

  /// Metadata for a valid entry, or `None` if absent, malformed or expired.
  pub fn entry_meta(&self, key: &str) -> Option<EntryMeta> {
    let (entry, size_bytes) = self.read_header(key)?;
    let now = self.now_ms();
    if !entry.is_valid_at(now) {
      return None;
    }

    let age_ms = entry.age_ms(now).max(0) as u64;
    Some(EntryMeta {
      timestamp: entry.timestamp,
      ttl: Duration::from_millis(entry.ttl_ms),
      age: Duration::from_millis(age_ms),
      remaining: Duration::from_millis(entry.ttl_ms.saturating_sub(age_ms)),
      size_bytes,
    })
  }

  /// Count entries under this namespace by validity.
  pub fn stats(&self) -> CacheStats {
    let mut stats = CacheStats {
      namespace: self.namespace.clone(),
      ..CacheStats::default()
    };

    let keys = self
      .store
      .keys_with_prefix(&self.namespace)
      .unwrap_or_default();
    let now = self.now_ms();

    for key in keys {
      let Some(raw) = self.read_raw(&key) else {
        continue;
      };
      stats.entries += 1;
      stats.bytes += key.len() + raw.len();
      match serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw) {
        Ok(entry) if entry.is_valid_at(now) => stats.valid += 1,
        Ok(_) => stats.expired += 1,
        Err(_) => stats.corrupt += 1,
      }
    }

    stats
  }
}

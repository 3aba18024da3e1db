//! Process-lifetime request cache.
//!
//! A lighter sibling of [`PersistentCache`](super::PersistentCache) for
//! short-lived, high-churn data such as prefetched pages. Entries live in
//! memory only, expire lazily, and have no size guard.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::clock::{Clock, SystemClock};

/// Default lifetime of an ephemeral entry.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct EphemeralEntry {
  data: Value,
  expires_at: i64,
}

/// In-memory cache shared by reference across hooks and background tasks.
#[derive(Clone)]
pub struct EphemeralCache {
  entries: Arc<Mutex<HashMap<String, EphemeralEntry>>>,
  clock: Arc<dyn Clock>,
}

impl EphemeralCache {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Read `key`, dropping it if it has expired.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let now = self.clock.now_ms();
    let mut entries = self.entries.lock().ok()?;

    let entry = entries.get(key)?;
    if now >= entry.expires_at {
      entries.remove(key);
      return None;
    }

    match serde_json::from_value(entry.data.clone()) {
      Ok(data) => Some(data),
      Err(e) => {
        debug!(key, error = %e, "Ephemeral entry does not match requested type");
        entries.remove(key);
        None
      }
    }
  }

  /// Store `data` under `key` for `expires_in` (default five minutes).
  pub fn set<T: Serialize>(&self, key: &str, data: &T, expires_in: Option<Duration>) {
    let Ok(data) = serde_json::to_value(data) else {
      debug!(key, "Ephemeral entry is not serializable, skipping");
      return;
    };
    let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRY);
    let expires_at = self.clock.now_ms() + expires_in.as_millis() as i64;

    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(key.to_string(), EphemeralEntry { data, expires_at });
    }
  }

  /// Whether `key` holds an unexpired entry.
  pub fn has(&self, key: &str) -> bool {
    let now = self.clock.now_ms();
    let Ok(mut entries) = self.entries.lock() else {
      return false;
    };

    match entries.get(key) {
      Some(entry) if now < entry.expires_at => true,
      Some(_) => {
        entries.remove(key);
        false
      }
      None => false,
    }
  }

  /// Remove `key`, or everything when `key` is `None`.
  pub fn clear(&self, key: Option<&str>) {
    if let Ok(mut entries) = self.entries.lock() {
      match key {
        Some(key) => {
          entries.remove(key);
        }
        None => entries.clear(),
      }
    }
  }

  /// Remove every key starting with `prefix`.
  pub fn clear_prefix(&self, prefix: &str) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.retain(|key, _| !key.starts_with(prefix));
    }
  }

  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for EphemeralCache {
  fn default() -> Self {
    Self::new()
  }
}

//! Key-value storage backends for the persistent cache.
//!
//! The cache only needs a small, string-keyed surface: get, set, remove,
//! indexed key enumeration and a count. Writes are bounded by a byte quota
//! and report a distinguishable [`StorageError::QuotaExceeded`] when full.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Default quota for a store, mirroring the budget browsers give an origin.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StorageError {
  #[error("storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
  QuotaExceeded { needed: usize, quota: usize },

  #[error("storage lock poisoned")]
  LockPoisoned,

  #[error("storage backend error: {0}")]
  Backend(String),
}

impl StorageError {
  pub fn is_quota_exceeded(&self) -> bool {
    matches!(self, StorageError::QuotaExceeded { .. })
  }
}

/// Trait for durable string key-value stores.
pub trait KeyValueStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

  /// Store `value` under `key`, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove_item(&self, key: &str) -> Result<(), StorageError>;

  /// Key at position `index` in the store's stable key order.
  fn key(&self, index: usize) -> Result<Option<String>, StorageError>;

  /// Number of stored keys.
  fn len(&self) -> Result<usize, StorageError>;

  fn is_empty(&self) -> Result<bool, StorageError> {
    Ok(self.len()? == 0)
  }

  /// All keys beginning with `prefix`.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    for index in 0..self.len()? {
      if let Some(key) = self.key(index)? {
        if key.starts_with(prefix) {
          keys.push(key);
        }
      }
    }
    Ok(keys)
  }
}

/// Bytes a key/value pair occupies against the quota.
fn entry_size(key: &str, value: &str) -> usize {
  key.len() + value.len()
}

/// In-memory store. Contents are lost when the process exits.
pub struct MemoryStore {
  items: Mutex<BTreeMap<String, String>>,
  quota_bytes: usize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::with_quota(DEFAULT_QUOTA_BYTES)
  }

  pub fn with_quota(quota_bytes: usize) -> Self {
    Self {
      items: Mutex::new(BTreeMap::new()),
      quota_bytes,
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyValueStore for MemoryStore {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;

    let used: usize = items
      .iter()
      .filter(|(k, _)| k.as_str() != key)
      .map(|(k, v)| entry_size(k, v))
      .sum();
    let needed = used + entry_size(key, value);
    if needed > self.quota_bytes {
      return Err(StorageError::QuotaExceeded {
        needed,
        quota: self.quota_bytes,
      });
    }

    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    items.remove(key);
    Ok(())
  }

  fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(items.keys().nth(index).cloned())
  }

  fn len(&self) -> Result<usize, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(items.len())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(
      items
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}

/// SQLite-backed durable store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  quota_bytes: usize,
}

/// Schema for the key-value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default(quota_bytes: usize) -> Result<Self, StorageError> {
    let path = Self::default_path()?;
    Self::open(&path, quota_bytes)
  }

  /// Open or create the store at `path`.
  pub fn open(path: &Path, quota_bytes: usize) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StorageError::Backend(format!("Failed to create cache directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StorageError::Backend(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::from_connection(conn, quota_bytes)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory(quota_bytes: usize) -> Result<Self, StorageError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StorageError::Backend(format!("Failed to open in-memory database: {}", e)))?;
    Self::from_connection(conn, quota_bytes)
  }

  fn from_connection(conn: Connection, quota_bytes: usize) -> Result<Self, StorageError> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| StorageError::Backend(format!("Failed to run cache migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
      quota_bytes,
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StorageError::Backend("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("duesboard").join("cache.db"))
  }
}

impl KeyValueStore for SqliteStore {
  fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StorageError::Backend(format!("Failed to read {}: {}", key, e)))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    let used: i64 = conn
      .query_row(
        "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
         FROM kv_store WHERE key != ?",
        params![key],
        |row| row.get(0),
      )
      .map_err(|e| StorageError::Backend(format!("Failed to measure store usage: {}", e)))?;

    let needed = used as usize + entry_size(key, value);
    if needed > self.quota_bytes {
      return Err(StorageError::QuotaExceeded {
        needed,
        quota: self.quota_bytes,
      });
    }

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| StorageError::Backend(format!("Failed to write {}: {}", key, e)))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| StorageError::Backend(format!("Failed to remove {}: {}", key, e)))?;

    Ok(())
  }

  fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    conn
      .query_row(
        "SELECT key FROM kv_store ORDER BY key LIMIT 1 OFFSET ?",
        params![index as i64],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StorageError::Backend(format!("Failed to read key {}: {}", index, e)))
  }

  fn len(&self) -> Result<usize, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
      .map_err(|e| StorageError::Backend(format!("Failed to count keys: {}", e)))?;

    Ok(count as usize)
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    // substr instead of LIKE: prefixes contain '_' which LIKE treats as a wildcard
    let mut stmt = conn
      .prepare("SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
      .map_err(|e| StorageError::Backend(format!("Failed to prepare prefix query: {}", e)))?;

    let keys = stmt
      .query_map(params![prefix], |row| row.get::<_, String>(0))
      .map_err(|e| StorageError::Backend(format!("Failed to query keys: {}", e)))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn exercise_basic_ops(store: &dyn KeyValueStore) {
    assert!(store.is_empty().unwrap());
    assert_eq!(store.get_item("a").unwrap(), None);

    store.set_item("b", "2").unwrap();
    store.set_item("a", "1").unwrap();
    assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(store.key(0).unwrap().as_deref(), Some("a"));
    assert_eq!(store.key(1).unwrap().as_deref(), Some("b"));
    assert_eq!(store.key(2).unwrap(), None);

    store.remove_item("a").unwrap();
    store.remove_item("missing").unwrap();
    assert_eq!(store.len().unwrap(), 1);
  }

  #[test]
  fn test_memory_store_basic_ops() {
    exercise_basic_ops(&MemoryStore::new());
  }

  #[test]
  fn test_sqlite_store_basic_ops() {
    exercise_basic_ops(&SqliteStore::open_in_memory(DEFAULT_QUOTA_BYTES).unwrap());
  }

  #[test]
  fn test_quota_exceeded_is_distinguishable() {
    let store = MemoryStore::with_quota(10);
    store.set_item("k", "12345").unwrap();
    let err = store.set_item("j", "123456789").unwrap_err();
    assert!(err.is_quota_exceeded());
    assert_eq!(store.get_item("j").unwrap(), None);

    let store = SqliteStore::open_in_memory(10).unwrap();
    store.set_item("k", "12345").unwrap();
    assert!(store.set_item("j", "123456789").unwrap_err().is_quota_exceeded());
  }

  #[test]
  fn test_replacing_a_key_does_not_count_old_value() {
    let store = MemoryStore::with_quota(10);
    store.set_item("k", "123456789").unwrap();
    store.set_item("k", "987654321").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("987654321"));

    let store = SqliteStore::open_in_memory(10).unwrap();
    store.set_item("k", "123456789").unwrap();
    store.set_item("k", "987654321").unwrap();
  }

  #[test]
  fn test_prefix_scan_treats_underscore_literally() {
    let store = SqliteStore::open_in_memory(DEFAULT_QUOTA_BYTES).unwrap();
    store.set_item("dept_admin_A_stats", "1").unwrap();
    store.set_item("deptXadmin_A_stats", "2").unwrap();
    store.set_item("payments_x", "3").unwrap();

    assert_eq!(
      store.keys_with_prefix("dept_admin_").unwrap(),
      vec!["dept_admin_A_stats".to_string()]
    );

    let memory = MemoryStore::new();
    memory.set_item("dept_admin_A_stats", "1").unwrap();
    memory.set_item("deptXadmin_A_stats", "2").unwrap();
    assert_eq!(memory.keys_with_prefix("dept_admin_").unwrap().len(), 1);
  }
}

//! Generic per-domain adapter over the persistent cache.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::persistent::{CacheStats, ClearTarget, EntryMeta, PersistentCache, SharedStore};
use super::traits::{CacheDomain, CacheScope, KeyParams};

/// Cache adapter for one domain.
///
/// This is the seam between fetched payloads and storage: writes run the
/// domain optimizer before reaching the persistent cache, and invalidation
/// works on the domain's namespaces.
pub struct DomainCache<D: CacheDomain> {
  cache: PersistentCache,
  _domain: PhantomData<D>,
}

impl<D: CacheDomain> DomainCache<D> {
  /// Create an adapter whose own namespace is `<PREFIX>_`.
  pub fn new(store: SharedStore, ttl: Duration) -> Self {
    Self::from_cache(PersistentCache::new(store, format!("{}_", D::PREFIX)).with_ttl(ttl))
  }

  pub fn from_cache(cache: PersistentCache) -> Self {
    Self {
      cache,
      _domain: PhantomData,
    }
  }

  pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
    Self::from_cache(self.cache.with_clock(clock))
  }

  pub fn with_max_entry_bytes(self, max_entry_bytes: usize) -> Self {
    Self::from_cache(self.cache.with_max_entry_bytes(max_entry_bytes))
  }

  pub fn cache(&self) -> &PersistentCache {
    &self.cache
  }

  pub fn build_key(&self, scope: &CacheScope, params: &KeyParams) -> String {
    D::build_key(scope, params)
  }

  pub fn namespace(&self, scope: &CacheScope) -> String {
    D::namespace(scope)
  }

  pub fn is_valid(&self, key: &str) -> bool {
    self.cache.is_valid(key)
  }

  pub fn read(&self, key: &str) -> Option<D::Cached> {
    self.cache.get(key)
  }

  /// Read a valid entry together with its metadata.
  pub fn read_entry(&self, key: &str) -> Option<(D::Cached, EntryMeta)> {
    let data = self.read(key)?;
    let meta = self.cache.entry_meta(key)?;
    Some((data, meta))
  }

  /// Optimize `raw` and store the projection.
  pub fn write(&self, key: &str, raw: &D::Raw) -> bool {
    self.write_optimized(key, &D::optimize(raw))
  }

  /// Store an already-optimized projection.
  pub fn write_optimized(&self, key: &str, data: &D::Cached) -> bool {
    self.cache.set(key, data, None)
  }

  /// Store a projection for `scope`; quota eviction stays within that scope.
  pub fn write_in(&self, scope: &CacheScope, key: &str, data: &D::Cached) -> bool {
    self.cache.set_in(&D::namespace(scope), key, data, None)
  }

  /// Drop every entry for `scope`.
  pub fn invalidate_namespace(&self, scope: &CacheScope) -> usize {
    let namespace = D::namespace(scope);
    self.cache.clear(ClearTarget::Prefix(&namespace))
  }

  /// Drop every entry of this domain, across scopes.
  pub fn invalidate_all(&self) -> usize {
    self.cache.clear(ClearTarget::Own)
  }

  pub fn stats(&self) -> CacheStats {
    self.cache.stats()
  }
}

impl<D: CacheDomain> Clone for DomainCache<D> {
  fn clone(&self) -> Self {
    Self::from_cache(self.cache.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::cache::storage::MemoryStore;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Deserialize)]
  struct RawNote {
    title: String,
    #[allow(dead_code)]
    body: String,
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct NoteTitle {
    title: String,
  }

  struct Notes;

  impl CacheDomain for Notes {
    type Raw = RawNote;
    type Cached = NoteTitle;
    const PREFIX: &'static str = "notes";
    const RESOURCE: &'static str = "list";

    fn optimize(raw: &RawNote) -> NoteTitle {
      NoteTitle {
        title: raw.title.clone(),
      }
    }
  }

  fn raw(title: &str) -> RawNote {
    RawNote {
      title: title.to_string(),
      body: "a long body the list never renders".to_string(),
    }
  }

  #[test]
  fn test_write_stores_optimized_projection() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let adapter = DomainCache::<Notes>::new(store.clone(), Duration::from_secs(300));
    let scope = CacheScope::new("super_admin");
    let key = adapter.build_key(&scope, &KeyParams::page(1));

    assert_eq!(key, "notes_super_admin_list_p1");
    assert!(adapter.write(&key, &raw("dues")));

    let stored = store.get_item(&key).unwrap().unwrap();
    assert!(!stored.contains("long body"));
    assert_eq!(
      adapter.read(&key),
      Some(NoteTitle {
        title: "dues".to_string()
      })
    );
  }

  #[test]
  fn test_invalidate_namespace_is_scoped() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let adapter = DomainCache::<Notes>::new(store, Duration::from_secs(300));
    let admin = CacheScope::new("super_admin");
    let finance = CacheScope::new("finance_director");

    for page in 1..=3 {
      adapter.write(&adapter.build_key(&admin, &KeyParams::page(page)), &raw("a"));
    }
    let finance_key = adapter.build_key(&finance, &KeyParams::page(1));
    adapter.write(&finance_key, &raw("f"));

    assert_eq!(adapter.invalidate_namespace(&admin), 3);
    assert!(adapter.is_valid(&finance_key));

    assert_eq!(adapter.invalidate_all(), 1);
    assert!(!adapter.is_valid(&finance_key));
  }

  #[test]
  fn test_read_entry_carries_meta() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(10_000));
    let adapter =
      DomainCache::<Notes>::new(store, Duration::from_secs(300)).with_clock(clock.clone());
    let key = adapter.build_key(&CacheScope::new("r"), &KeyParams::default());

    adapter.write(&key, &raw("t"));
    clock.advance(1_000);

    let (data, meta) = adapter.read_entry(&key).unwrap();
    assert_eq!(data.title, "t");
    assert_eq!(meta.timestamp, 10_000);
    assert_eq!(meta.remaining, Duration::from_secs(299));
  }
}

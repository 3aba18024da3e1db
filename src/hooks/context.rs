//! Wiring between configuration, the API client and per-domain hooks.

use color_eyre::Report;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::cache::{
  CollegeStatsDomain, DashboardDomain, DepartmentStatsDomain, ExecutivesDomain, ExpensesDomain,
  PaymentsDomain,
};
use crate::api::ApiClient;
use crate::cache::{
  CacheDomain, CacheScope, DomainCache, EphemeralCache, KeyParams, MemoryStore, SharedStore,
  SqliteStore,
};
use crate::config::{CacheConfig, Config};

use super::{DataHook, HookOptions};

/// Everything a hook needs besides its domain.
#[derive(Clone)]
pub struct HookContext {
  client: ApiClient,
  store: SharedStore,
  cache: CacheConfig,
  scope: CacheScope,
  prefetch: EphemeralCache,
}

impl HookContext {
  pub fn new(client: ApiClient, store: SharedStore, cache: CacheConfig, scope: CacheScope) -> Self {
    Self {
      client,
      store,
      cache,
      scope,
      prefetch: EphemeralCache::new(),
    }
  }

  /// Build a context from configuration, opening the configured store.
  pub fn from_config(config: &Config, client: ApiClient) -> Self {
    let store = open_store(&config.cache);
    Self::new(client, store, config.cache.clone(), config.session.scope())
  }

  pub fn store(&self) -> &SharedStore {
    &self.store
  }

  pub fn scope(&self) -> &CacheScope {
    &self.scope
  }

  pub fn client(&self) -> &ApiClient {
    &self.client
  }

  pub fn options(&self) -> HookOptions {
    HookOptions {
      grace_window: Duration::from_secs(self.cache.grace_secs),
      revalidate_delay: Duration::from_millis(self.cache.revalidate_delay_ms),
      debounce: Duration::from_millis(self.cache.debounce_ms),
    }
  }

  /// Adapter for domain `D` over the shared store.
  pub fn adapter<D: CacheDomain>(&self) -> DomainCache<D> {
    DomainCache::<D>::new(self.store.clone(), self.cache.ttl())
      .with_max_entry_bytes(self.cache.max_entry_bytes)
  }

  fn hook<D: CacheDomain>(&self, hook: DataHook<D>) -> DataHook<D> {
    hook.with_options(self.options())
  }

  fn paged_hook<D: CacheDomain>(&self, hook: DataHook<D>) -> DataHook<D> {
    let hook = self.hook(hook).with_params(KeyParams::page(1));
    if self.cache.prefetch {
      hook.with_prefetch(self.prefetch.clone())
    } else {
      hook
    }
  }

  pub fn dashboard(&self) -> DataHook<DashboardDomain> {
    let client = self.client.clone();
    self.hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |_params| {
        let client = client.clone();
        async move { client.dashboard_overview().await.map_err(Report::from) }
      },
    ))
  }

  pub fn college_stats(&self) -> DataHook<CollegeStatsDomain> {
    let client = self.client.clone();
    let college = self.scope.college.clone().unwrap_or_default();
    self.hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |_params| {
        let client = client.clone();
        let college = college.clone();
        async move { client.college_stats(&college).await.map_err(Report::from) }
      },
    ))
  }

  pub fn department_stats(&self) -> DataHook<DepartmentStatsDomain> {
    let client = self.client.clone();
    let department = self.scope.department.clone().unwrap_or_default();
    self.hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |_params| {
        let client = client.clone();
        let department = department.clone();
        async move { client.department_stats(&department).await.map_err(Report::from) }
      },
    ))
  }

  pub fn payments(&self) -> DataHook<PaymentsDomain> {
    let client = self.client.clone();
    let scope = self.scope.clone();
    self.paged_hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |params| {
        let client = client.clone();
        let scope = scope.clone();
        async move { client.payments(&scope, &params).await.map_err(Report::from) }
      },
    ))
  }

  pub fn expenses(&self) -> DataHook<ExpensesDomain> {
    let client = self.client.clone();
    let scope = self.scope.clone();
    self.paged_hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |params| {
        let client = client.clone();
        let scope = scope.clone();
        async move { client.expenses(&scope, &params).await.map_err(Report::from) }
      },
    ))
  }

  pub fn executives(&self) -> DataHook<ExecutivesDomain> {
    let client = self.client.clone();
    let scope = self.scope.clone();
    self.hook(DataHook::new(
      self.adapter(),
      self.scope.clone(),
      move |_params| {
        let client = client.clone();
        let scope = scope.clone();
        async move { client.executives(&scope).await.map_err(Report::from) }
      },
    ))
  }
}

/// Open the durable store, falling back to memory when it is disabled or
/// cannot be opened. Caching problems never stop the dashboard.
pub fn open_store(config: &CacheConfig) -> SharedStore {
  if !config.enabled {
    info!("Persistent cache disabled, using memory store");
    return Arc::new(MemoryStore::with_quota(config.quota_bytes));
  }

  let opened = match &config.path {
    Some(path) => SqliteStore::open(path, config.quota_bytes),
    None => SqliteStore::open_default(config.quota_bytes),
  };

  match opened {
    Ok(store) => Arc::new(store),
    Err(e) => {
      warn!(error = %e, "Failed to open cache database, using memory store");
      Arc::new(MemoryStore::with_quota(config.quota_bytes))
    }
  }
}

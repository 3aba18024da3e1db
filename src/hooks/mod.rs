//! Cache-backed data hooks.
//!
//! A [`DataHook`] owns the loading state for one domain and one scope. It
//! reads through the domain cache, serves cached data immediately, revalidates
//! in the background when an entry is close to expiry, and writes fresh
//! network results back through the adapter.
//!
//! Hooks are driven from the UI event loop: call [`DataHook::load`] once,
//! then [`DataHook::poll`] on every tick to apply finished fetches and
//! scheduled refreshes.
//!
//! # Example
//!
//! ```ignore
//! let client = api_client.clone();
//! let mut hook = DataHook::new(adapter, scope, move |params| {
//!     let client = client.clone();
//!     async move { Ok(client.payments(&scope, &params).await?) }
//! });
//!
//! hook.load(false);
//!
//! // In event loop tick
//! if hook.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

mod context;

pub use context::HookContext;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::{CacheDomain, CacheScope, CacheStatus, DomainCache, EphemeralCache, KeyParams};

/// Shown once per session when cache writes start failing.
const CACHE_DISABLED_NOTICE: &str =
  "Local cache is full or unavailable; data will be fetched from the server until you refresh";

/// The state of a hook's data
#[derive(Debug, Clone)]
pub enum HookState<T> {
  /// Nothing requested yet
  Idle,
  /// First load in progress, nothing to show
  Loading,
  /// Data available (possibly being refreshed)
  Ready(T),
  /// Load failed and there is no data to fall back to
  Error(String),
}

impl<T> HookState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, HookState::Loading)
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, HookState::Ready(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      HookState::Ready(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      HookState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Why a load was started. Decides whether a failure is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
  Initial,
  Params,
  Background,
  Visibility,
  Mutation,
  Manual,
}

/// Timing knobs for a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookOptions {
  /// Cached entries with less than this left are revalidated in the background
  pub grace_window: Duration,
  /// Delay before a background revalidation starts
  pub revalidate_delay: Duration,
  /// Quiet period after a parameter change before loading
  pub debounce: Duration,
}

impl Default for HookOptions {
  fn default() -> Self {
    Self {
      grace_window: Duration::from_secs(60),
      revalidate_delay: Duration::from_secs(1),
      debounce: Duration::from_millis(400),
    }
  }
}

/// A boxed future that returns a domain payload
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A factory function that creates futures for fetching one parameter set
type FetcherFn<T> = Arc<dyn Fn(KeyParams) -> BoxFuture<T> + Send + Sync>;

enum HookMessage<R> {
  Fetched {
    generation: u64,
    origin: RefreshOrigin,
    params: KeyParams,
    result: std::result::Result<R, String>,
  },
  Prefetched {
    epoch: u64,
    key: String,
    raw: R,
  },
  Revalidate {
    key: String,
  },
  Debounced {
    seq: u64,
  },
}

/// Cache-backed loader for one domain and scope.
pub struct DataHook<D: CacheDomain> {
  adapter: DomainCache<D>,
  scope: CacheScope,
  params: KeyParams,
  fetcher: FetcherFn<D::Raw>,
  prefetch: Option<EphemeralCache>,
  options: HookOptions,

  state: HookState<D::Cached>,
  refreshing: bool,
  cache_status: CacheStatus,
  last_updated: Option<DateTime<Utc>>,
  error: Option<String>,
  notice: Option<String>,
  cache_available: bool,

  /// Latest issued network request; older responses are dropped
  generation: u64,
  in_flight: Option<u64>,
  /// Bumped whenever this scope's cache is cleared; older prefetches are dropped
  epoch: u64,
  revalidate_scheduled: bool,
  debounce_seq: u64,
  pending_params: Option<KeyParams>,
  fetch_count: u64,

  tx: mpsc::UnboundedSender<HookMessage<D::Raw>>,
  rx: mpsc::UnboundedReceiver<HookMessage<D::Raw>>,
}

impl<D: CacheDomain> DataHook<D> {
  /// Create a hook with the given fetcher.
  ///
  /// The fetcher is called with the current parameters each time the hook
  /// goes to the network; it should issue its requests concurrently when it
  /// needs more than one.
  pub fn new<F, Fut>(adapter: DomainCache<D>, scope: CacheScope, fetcher: F) -> Self
  where
    F: Fn(KeyParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<D::Raw>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      adapter,
      scope,
      params: KeyParams::default(),
      fetcher: Arc::new(move |params| Box::pin(fetcher(params))),
      prefetch: None,
      options: HookOptions::default(),
      state: HookState::Idle,
      refreshing: false,
      cache_status: CacheStatus::Uncached,
      last_updated: None,
      error: None,
      notice: None,
      cache_available: true,
      generation: 0,
      in_flight: None,
      epoch: 0,
      revalidate_scheduled: false,
      debounce_seq: 0,
      pending_params: None,
      fetch_count: 0,
      tx,
      rx,
    }
  }

  pub fn with_options(mut self, options: HookOptions) -> Self {
    self.options = options;
    self
  }

  pub fn with_params(mut self, params: KeyParams) -> Self {
    self.params = params;
    self
  }

  /// Prefetch following pages into `cache`.
  pub fn with_prefetch(mut self, cache: EphemeralCache) -> Self {
    self.prefetch = Some(cache);
    self
  }

  // ===== Accessors =====

  pub fn state(&self) -> &HookState<D::Cached> {
    &self.state
  }

  pub fn data(&self) -> Option<&D::Cached> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_refreshing(&self) -> bool {
    self.refreshing
  }

  pub fn cache_status(&self) -> CacheStatus {
    self.cache_status
  }

  pub fn last_updated(&self) -> Option<DateTime<Utc>> {
    self.last_updated
  }

  /// User-visible error, if any.
  pub fn error(&self) -> Option<&str> {
    self.state.error().or(self.error.as_deref())
  }

  /// One-off, non-blocking message (e.g. caching disabled).
  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  pub fn dismiss_notice(&mut self) {
    self.notice = None;
  }

  pub fn cache_available(&self) -> bool {
    self.cache_available
  }

  pub fn is_in_flight(&self) -> bool {
    self.in_flight.is_some()
  }

  /// Network loads issued so far, prefetches excluded.
  pub fn fetch_count(&self) -> u64 {
    self.fetch_count
  }

  pub fn params(&self) -> &KeyParams {
    &self.params
  }

  pub fn scope(&self) -> &CacheScope {
    &self.scope
  }

  pub fn adapter(&self) -> &DomainCache<D> {
    &self.adapter
  }

  pub fn current_key(&self) -> String {
    self.adapter.build_key(&self.scope, &self.params)
  }

  // ===== Loading =====

  /// Load data, from the cache unless `force_refresh` is set.
  pub fn load(&mut self, force_refresh: bool) {
    let origin = if force_refresh {
      RefreshOrigin::Manual
    } else {
      RefreshOrigin::Initial
    };
    self.load_with(force_refresh, origin);
  }

  fn load_with(&mut self, force_refresh: bool, origin: RefreshOrigin) {
    if origin == RefreshOrigin::Initial && self.in_flight.is_some() {
      return;
    }

    if !force_refresh && self.cache_available {
      let key = self.current_key();
      if let Some((data, meta)) = self.adapter.read_entry(&key) {
        debug!(%key, remaining = ?meta.remaining, "Serving from cache");
        self.supersede_in_flight();
        self.state = HookState::Ready(data);
        self.cache_status = CacheStatus::Fresh;
        self.last_updated = meta.cached_at();
        self.error = None;

        if meta.remaining <= self.options.grace_window {
          self.schedule_revalidate();
        }
        return;
      }

      if let Some(data) = self.take_prefetched(&key) {
        debug!(%key, "Serving prefetched page");
        self.supersede_in_flight();
        let params = self.params.clone();
        self.apply_fresh(&params, data);
        return;
      }
    }

    self.start_fetch(origin);
  }

  /// Clear this scope's cache and fetch again, re-enabling caching.
  pub fn handle_manual_refresh(&mut self) {
    let cleared = self.clear_scope();
    debug!(cleared, namespace = %self.adapter.namespace(&self.scope), "Manual refresh");

    self.cache_available = true;
    self.error = None;
    self.notice = None;
    self.start_fetch(RefreshOrigin::Manual);
  }

  /// The underlying data changed on the server (e.g. after a write).
  pub fn invalidate(&mut self) {
    self.clear_scope();
    self.start_fetch(RefreshOrigin::Mutation);
  }

  /// Drop persisted and prefetched entries for this scope.
  fn clear_scope(&mut self) -> usize {
    self.epoch += 1;
    if let Some(prefetch) = &self.prefetch {
      prefetch.clear_prefix(&self.adapter.namespace(&self.scope));
    }
    self.adapter.invalidate_namespace(&self.scope)
  }

  /// A load answered locally makes any outstanding response obsolete.
  fn supersede_in_flight(&mut self) {
    if let Some(generation) = self.in_flight.take() {
      debug!(generation, "Superseding in-flight request");
      self.generation += 1;
      self.refreshing = false;
    }
  }

  /// The dashboard came back to the foreground.
  ///
  /// Starts one forced refresh when the cached entry has expired and nothing
  /// is already loading. Returns whether a refresh was started.
  pub fn on_visibility_regained(&mut self) -> bool {
    if self.in_flight.is_some() || self.adapter.is_valid(&self.current_key()) {
      return false;
    }

    if self.state.is_ready() {
      self.cache_status = CacheStatus::Stale;
    }
    self.load_with(true, RefreshOrigin::Visibility);
    true
  }

  /// Change parameters after the debounce interval. Only the last change in
  /// a burst loads.
  pub fn set_params(&mut self, params: KeyParams) {
    self.pending_params = Some(params);
    self.debounce_seq += 1;
    let seq = self.debounce_seq;
    let tx = self.tx.clone();
    let delay = self.options.debounce;

    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(HookMessage::Debounced { seq });
    });
  }

  /// Change parameters and load right away.
  pub fn apply_params(&mut self, params: KeyParams) {
    self.pending_params = None;
    self.params = params;
    self.load_with(false, RefreshOrigin::Params);
  }

  /// Step to the following page, debounced. Returns false for unpaginated
  /// hooks and on the last loaded page.
  pub fn next_page(&mut self) -> bool {
    let current = self.pending_params.as_ref().unwrap_or(&self.params);
    let Some(page) = current.page else {
      return false;
    };
    if self.pending_params.is_none() && !self.data().is_some_and(|data| D::has_next_page(data)) {
      return false;
    }

    let mut next = current.clone();
    next.page = Some(page + 1);
    self.set_params(next);
    true
  }

  pub fn prev_page(&mut self) -> bool {
    let current = self.pending_params.as_ref().unwrap_or(&self.params);
    match current.page {
      Some(page) if page > 1 => {
        let mut prev = current.clone();
        prev.page = Some(page - 1);
        self.set_params(prev);
        true
      }
      _ => false,
    }
  }

  /// Page the hook is showing or about to show.
  pub fn page(&self) -> Option<u32> {
    self.pending_params.as_ref().unwrap_or(&self.params).page
  }

  /// Poll for finished fetches and scheduled work.
  ///
  /// Returns `true` if anything visible changed. Call this in your event
  /// loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(message) = self.rx.try_recv() {
      changed |= self.handle_message(message);
    }
    changed
  }

  fn handle_message(&mut self, message: HookMessage<D::Raw>) -> bool {
    match message {
      HookMessage::Fetched {
        generation,
        origin,
        params,
        result,
      } => {
        if generation != self.generation {
          debug!(generation, latest = self.generation, "Discarding out-of-date response");
          return false;
        }
        self.in_flight = None;
        self.refreshing = false;

        match result {
          Ok(raw) => self.apply_fresh(&params, D::optimize(&raw)),
          Err(e) => self.apply_failure(origin, e),
        }
        true
      }
      HookMessage::Prefetched { epoch, key, raw } => {
        if epoch != self.epoch {
          debug!(%key, "Dropping prefetch from before invalidation");
          return false;
        }
        if let Some(prefetch) = &self.prefetch {
          prefetch.set(&key, &D::optimize(&raw), None);
        }
        false
      }
      HookMessage::Revalidate { key } => {
        self.revalidate_scheduled = false;
        if self.in_flight.is_some() || key != self.current_key() {
          return false;
        }
        self.load_with(true, RefreshOrigin::Background);
        true
      }
      HookMessage::Debounced { seq } => {
        if seq != self.debounce_seq {
          return false;
        }
        match self.pending_params.take() {
          Some(params) => {
            self.params = params;
            self.load_with(false, RefreshOrigin::Params);
            true
          }
          None => false,
        }
      }
    }
  }

  fn start_fetch(&mut self, origin: RefreshOrigin) {
    self.generation += 1;
    let generation = self.generation;
    self.in_flight = Some(generation);
    self.fetch_count += 1;

    if self.state.is_ready() {
      self.refreshing = true;
    } else {
      self.state = HookState::Loading;
    }

    debug!(key = %self.current_key(), generation, ?origin, "Fetching");
    let params = self.params.clone();
    let future = (self.fetcher)(params.clone());
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let result = future.await.map_err(|e| e.to_string());
      // Ignore send errors - the hook may have been dropped
      let _ = tx.send(HookMessage::Fetched {
        generation,
        origin,
        params,
        result,
      });
    });
  }

  fn apply_fresh(&mut self, params: &KeyParams, data: D::Cached) {
    let key = self.adapter.build_key(&self.scope, params);
    self.cache_status = CacheStatus::Uncached;
    self.last_updated = Some(Utc::now());
    self.error = None;

    if self.cache_available {
      if self.adapter.write_in(&self.scope, &key, &data) {
        self.cache_status = CacheStatus::Fresh;
        if let Some(timestamp) = self
          .adapter
          .cache()
          .entry_meta(&key)
          .and_then(|meta| meta.cached_at())
        {
          self.last_updated = Some(timestamp);
        }
      } else {
        warn!(%key, "Cache write failed, disabling cache for this session");
        self.cache_available = false;
        self.notice = Some(CACHE_DISABLED_NOTICE.to_string());
      }
    }

    self.prefetch_next(params, &data);
    self.state = HookState::Ready(data);
  }

  fn apply_failure(&mut self, origin: RefreshOrigin, error: String) {
    warn!(key = %self.current_key(), ?origin, error = %error, "Load failed");

    if self.state.is_ready() {
      self.cache_status = CacheStatus::Stale;
      if origin == RefreshOrigin::Manual {
        self.error = Some(error);
      }
    } else {
      self.state = HookState::Error(error);
    }
  }

  fn schedule_revalidate(&mut self) {
    if self.revalidate_scheduled {
      return;
    }
    self.revalidate_scheduled = true;

    let tx = self.tx.clone();
    let delay = self.options.revalidate_delay;
    let key = self.current_key();
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(HookMessage::Revalidate { key });
    });
  }

  fn take_prefetched(&self, key: &str) -> Option<D::Cached> {
    let prefetch = self.prefetch.as_ref()?;
    let data = prefetch.get::<D::Cached>(key)?;
    prefetch.clear(Some(key));
    Some(data)
  }

  fn prefetch_next(&self, params: &KeyParams, data: &D::Cached) {
    let Some(prefetch) = &self.prefetch else {
      return;
    };
    if !D::has_next_page(data) {
      return;
    }

    let mut next = params.clone();
    next.page = Some(next.page.unwrap_or(1) + 1);
    let key = self.adapter.build_key(&self.scope, &next);
    if prefetch.has(&key) || self.adapter.is_valid(&key) {
      return;
    }

    debug!(%key, "Prefetching next page");
    let future = (self.fetcher)(next);
    let tx = self.tx.clone();
    let epoch = self.epoch;
    tokio::spawn(async move {
      match future.await {
        Ok(raw) => {
          let _ = tx.send(HookMessage::Prefetched { epoch, key, raw });
        }
        Err(e) => debug!(%key, error = %e, "Prefetch failed"),
      }
    });
  }
}

impl<D: CacheDomain> std::fmt::Debug for DataHook<D>
where
  D::Cached: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DataHook")
      .field("key", &self.current_key())
      .field("state", &self.state)
      .field("refreshing", &self.refreshing)
      .field("cache_status", &self.cache_status)
      .field("cache_available", &self.cache_available)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{ManualClock, MemoryStore, SharedStore};
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

  const T0: i64 = 1_700_000_000_000;

  #[derive(Debug, Deserialize)]
  struct RawItems {
    page: u32,
    items: Vec<String>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    #[allow(dead_code)]
    noise: String,
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Items {
    page: u32,
    items: Vec<String>,
    has_more: bool,
  }

  struct ItemsDomain;

  impl CacheDomain for ItemsDomain {
    type Raw = RawItems;
    type Cached = Items;
    const PREFIX: &'static str = "items";
    const RESOURCE: &'static str = "list";

    fn optimize(raw: &RawItems) -> Items {
      Items {
        page: raw.page,
        items: raw.items.clone(),
        has_more: raw.has_more,
      }
    }

    fn has_next_page(data: &Items) -> bool {
      data.has_more
    }
  }

  struct Fixture {
    store: SharedStore,
    clock: Arc<ManualClock>,
    calls: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
    page_two_delay_ms: Arc<AtomicU64>,
  }

  fn fast_options() -> HookOptions {
    HookOptions {
      grace_window: Duration::from_secs(60),
      revalidate_delay: Duration::from_millis(20),
      debounce: Duration::from_millis(30),
    }
  }

  fn scope() -> CacheScope {
    CacheScope::new("super_admin")
  }

  impl Fixture {
    fn new() -> Self {
      Self {
        store: Arc::new(MemoryStore::new()),
        clock: Arc::new(ManualClock::new(T0)),
        calls: Arc::new(AtomicU32::new(0)),
        fail: Arc::new(AtomicBool::new(false)),
        page_two_delay_ms: Arc::new(AtomicU64::new(0)),
      }
    }

    fn adapter(&self) -> DomainCache<ItemsDomain> {
      DomainCache::<ItemsDomain>::new(self.store.clone(), Duration::from_secs(300))
        .with_clock(self.clock.clone())
    }

    /// Hook whose fetcher returns `v<n>` for the n-th call. Page 1 waits
    /// `slow_page_one` before answering.
    fn hook_with(
      &self,
      adapter: DomainCache<ItemsDomain>,
      slow_page_one: Duration,
      has_more: bool,
    ) -> DataHook<ItemsDomain> {
      let calls = self.calls.clone();
      let fail = self.fail.clone();
      let page_two_delay_ms = self.page_two_delay_ms.clone();
      DataHook::new(adapter, scope(), move |params: KeyParams| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = fail.load(Ordering::SeqCst);
        let page_two_delay = Duration::from_millis(page_two_delay_ms.load(Ordering::SeqCst));
        async move {
          let page = params.page.unwrap_or(1);
          if page == 1 && !slow_page_one.is_zero() {
            tokio::time::sleep(slow_page_one).await;
          }
          if page == 2 && !page_two_delay.is_zero() {
            tokio::time::sleep(page_two_delay).await;
          }
          if fail {
            return Err(eyre!("network down"));
          }
          Ok(RawItems {
            page,
            items: vec![format!("v{}", n)],
            has_more,
            noise: "x".repeat(64),
          })
        }
      })
      .with_options(fast_options())
    }

    fn hook(&self) -> DataHook<ItemsDomain> {
      self.hook_with(self.adapter(), Duration::ZERO, false)
    }

    fn calls(&self) -> u32 {
      self.calls.load(Ordering::SeqCst)
    }
  }

  async fn settle(hook: &mut DataHook<ItemsDomain>, ms: u64) -> bool {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    hook.poll()
  }

  #[tokio::test]
  async fn test_cold_load_fetches_and_writes_through() {
    let fx = Fixture::new();
    let mut hook = fx.hook();

    assert!(matches!(hook.state(), HookState::Idle));
    hook.load(false);
    assert!(hook.is_loading());
    assert_eq!(hook.cache_status(), CacheStatus::Uncached);

    assert!(settle(&mut hook, 10).await);
    assert_eq!(hook.data().unwrap().items, vec!["v1"]);
    assert_eq!(hook.cache_status(), CacheStatus::Fresh);
    assert!(hook.last_updated().is_some());
    assert!(fx.store.get_item(&hook.current_key()).unwrap().is_some());
    assert_eq!(fx.calls(), 1);
  }

  #[tokio::test]
  async fn test_valid_cache_is_served_without_fetching() {
    let fx = Fixture::new();
    let adapter = fx.adapter();
    let key = adapter.build_key(&scope(), &KeyParams::default());
    adapter.write_optimized(
      &key,
      &Items {
        page: 1,
        items: vec!["cached".to_string()],
        has_more: false,
      },
    );

    let mut hook = fx.hook_with(adapter, Duration::ZERO, false);
    hook.load(false);

    assert_eq!(hook.data().unwrap().items, vec!["cached"]);
    assert_eq!(hook.cache_status(), CacheStatus::Fresh);
    assert_eq!(hook.last_updated().unwrap().timestamp_millis(), T0);
    assert!(!hook.is_in_flight());

    assert!(!settle(&mut hook, 50).await);
    assert_eq!(fx.calls(), 0);
  }

  #[tokio::test]
  async fn test_aging_entry_is_revalidated_once_in_background() {
    let fx = Fixture::new();
    let adapter = fx.adapter();
    let key = adapter.build_key(&scope(), &KeyParams::default());
    adapter.write_optimized(
      &key,
      &Items {
        page: 1,
        items: vec!["cached".to_string()],
        has_more: false,
      },
    );
    fx.clock.advance(4 * 60 * 1000);

    let mut hook = fx.hook_with(adapter, Duration::ZERO, false);
    hook.load(false);
    hook.load(false);
    assert_eq!(hook.data().unwrap().items, vec!["cached"]);
    assert_eq!(fx.calls(), 0);

    // Scheduled refresh fires and starts one fetch
    assert!(settle(&mut hook, 50).await);
    assert_eq!(fx.calls(), 1);
    assert!(hook.is_refreshing());
    assert_eq!(hook.data().unwrap().items, vec!["cached"]);

    assert!(settle(&mut hook, 20).await);
    assert!(!hook.is_refreshing());
    assert_eq!(hook.data().unwrap().items, vec!["v1"]);
    assert_eq!(hook.cache_status(), CacheStatus::Fresh);

    settle(&mut hook, 50).await;
    assert_eq!(fx.calls(), 1);
  }

  #[tokio::test]
  async fn test_entry_far_from_expiry_is_not_revalidated() {
    let fx = Fixture::new();
    let adapter = fx.adapter();
    let key = adapter.build_key(&scope(), &KeyParams::default());
    adapter.write_optimized(
      &key,
      &Items {
        page: 1,
        items: vec![],
        has_more: false,
      },
    );
    fx.clock.advance(60 * 1000);

    let mut hook = fx.hook_with(adapter, Duration::ZERO, false);
    hook.load(false);
    settle(&mut hook, 60).await;
    assert_eq!(fx.calls(), 0);
  }

  #[tokio::test]
  async fn test_manual_refresh_clears_namespace_and_fetches_once() {
    let fx = Fixture::new();
    let adapter = fx.adapter();
    for page in 1..=5 {
      let key = adapter.build_key(&scope(), &KeyParams::page(page));
      adapter.write_optimized(
        &key,
        &Items {
          page,
          items: vec![],
          has_more: false,
        },
      );
    }
    let namespace = adapter.namespace(&scope());
    assert_eq!(fx.store.keys_with_prefix(&namespace).unwrap().len(), 5);

    let mut hook = fx.hook_with(adapter, Duration::ZERO, false);
    hook.handle_manual_refresh();

    assert!(fx.store.keys_with_prefix(&namespace).unwrap().is_empty());
    settle(&mut hook, 10).await;
    assert_eq!(fx.calls(), 1);
    assert_eq!(hook.data().unwrap().items, vec!["v1"]);
  }

  #[tokio::test]
  async fn test_out_of_order_response_is_discarded() {
    let fx = Fixture::new();
    let mut hook = fx.hook_with(fx.adapter(), Duration::from_millis(60), false);

    hook.apply_params(KeyParams::page(1));
    hook.apply_params(KeyParams::page(2));

    settle(&mut hook, 20).await;
    assert_eq!(hook.data().unwrap().page, 2);

    // Page 1 answers late and must not overwrite page 2
    settle(&mut hook, 80).await;
    assert_eq!(hook.data().unwrap().page, 2);
    assert_eq!(hook.data().unwrap().items, vec!["v2"]);
    assert!(!hook.is_in_flight());
  }

  #[tokio::test]
  async fn test_cache_hit_supersedes_in_flight_request() {
    let fx = Fixture::new();
    let adapter = fx.adapter();
    let page_two = adapter.build_key(&scope(), &KeyParams::page(2));
    adapter.write_optimized(
      &page_two,
      &Items {
        page: 2,
        items: vec!["cached2".to_string()],
        has_more: false,
      },
    );
    let mut hook = fx.hook_with(adapter.clone(), Duration::from_millis(60), false);

    hook.apply_params(KeyParams::page(1));
    assert!(hook.is_in_flight());
    hook.apply_params(KeyParams::page(2));
    assert!(!hook.is_in_flight());
    assert_eq!(hook.data().unwrap().items, vec!["cached2"]);

    // The page 1 response lands late and is ignored
    assert!(!settle(&mut hook, 90).await);
    assert_eq!(hook.data().unwrap().page, 2);
    assert_eq!(hook.data().unwrap().items, vec!["cached2"]);
    assert_eq!(adapter.read(&page_two).unwrap().items, vec!["cached2"]);
    assert!(!adapter.is_valid(&adapter.build_key(&scope(), &KeyParams::page(1))));
  }

  #[tokio::test]
  async fn test_failure_without_data_is_an_error() {
    let fx = Fixture::new();
    fx.fail.store(true, Ordering::SeqCst);
    let mut hook = fx.hook();

    hook.load(false);
    settle(&mut hook, 10).await;
    assert_eq!(hook.error(), Some("network down"));
    assert!(hook.data().is_none());
  }

  #[tokio::test]
  async fn test_background_failure_keeps_data_quietly() {
    let fx = Fixture::new();
    let mut hook = fx.hook();
    hook.load(false);
    settle(&mut hook, 10).await;

    fx.fail.store(true, Ordering::SeqCst);
    fx.clock.advance(5 * 60 * 1000);
    assert!(hook.on_visibility_regained());
    settle(&mut hook, 10).await;

    assert_eq!(hook.data().unwrap().items, vec!["v1"]);
    assert_eq!(hook.cache_status(), CacheStatus::Stale);
    assert_eq!(hook.error(), None);
  }

  #[tokio::test]
  async fn test_manual_failure_is_reported_over_data() {
    let fx = Fixture::new();
    let mut hook = fx.hook();
    hook.load(false);
    settle(&mut hook, 10).await;

    fx.fail.store(true, Ordering::SeqCst);
    hook.handle_manual_refresh();
    settle(&mut hook, 10).await;

    assert_eq!(hook.data().unwrap().items, vec!["v1"]);
    assert_eq!(hook.error(), Some("network down"));
  }

  #[tokio::test]
  async fn test_failed_write_disables_cache_for_session() {
    let fx = Fixture::new();
    let adapter = fx.adapter().with_max_entry_bytes(10);
    let mut hook = fx.hook_with(adapter, Duration::ZERO, false);

    hook.load(false);
    settle(&mut hook, 10).await;
    assert!(!hook.cache_available());
    assert_eq!(hook.cache_status(), CacheStatus::Uncached);
    assert!(hook.notice().is_some());
    hook.dismiss_notice();

    // Subsequent loads skip the cache and go to the network
    hook.load(false);
    settle(&mut hook, 10).await;
    assert_eq!(fx.calls(), 2);
    assert!(hook.notice().is_none());

    // Manual refresh retries caching optimistically
    hook.handle_manual_refresh();
    assert!(hook.cache_available());
  }

  #[tokio::test]
  async fn test_visibility_refresh_only_when_expired() {
    let fx = Fixture::new();
    let mut hook = fx.hook();
    hook.load(false);
    settle(&mut hook, 10).await;

    assert!(!hook.on_visibility_regained());
    assert_eq!(fx.calls(), 1);

    fx.clock.advance(5 * 60 * 1000);
    assert!(hook.on_visibility_regained());
    // Already in flight
    assert!(!hook.on_visibility_regained());
    assert_eq!(fx.calls(), 2);

    settle(&mut hook, 10).await;
    assert_eq!(hook.data().unwrap().items, vec!["v2"]);
    assert_eq!(hook.cache_status(), CacheStatus::Fresh);
  }

  #[tokio::test]
  async fn test_debounced_params_load_once_with_last_value() {
    let fx = Fixture::new();
    let mut hook = fx.hook();

    hook.set_params(KeyParams::page(2));
    hook.set_params(KeyParams::page(3));
    hook.set_params(KeyParams::page(4));
    assert_eq!(fx.calls(), 0);

    settle(&mut hook, 60).await;
    assert_eq!(fx.calls(), 1);
    assert_eq!(hook.params().page, Some(4));

    settle(&mut hook, 10).await;
    assert_eq!(hook.data().unwrap().page, 4);
  }

  #[tokio::test]
  async fn test_next_page_is_prefetched_and_served() {
    let fx = Fixture::new();
    let prefetch = EphemeralCache::new();
    let mut hook = fx
      .hook_with(fx.adapter(), Duration::ZERO, true)
      .with_prefetch(prefetch.clone());

    hook.apply_params(KeyParams::page(1));
    settle(&mut hook, 10).await;
    settle(&mut hook, 10).await;
    assert_eq!(fx.calls(), 2);
    assert!(prefetch.has(&hook.adapter().build_key(&scope(), &KeyParams::page(2))));

    hook.apply_params(KeyParams::page(2));
    assert_eq!(hook.data().unwrap().page, 2);
    assert_eq!(hook.data().unwrap().items, vec!["v2"]);
    assert_eq!(hook.fetch_count(), 1);
    assert_eq!(hook.cache_status(), CacheStatus::Fresh);
  }

  #[tokio::test]
  async fn test_invalidate_drops_prefetched_pages() {
    let fx = Fixture::new();
    let prefetch = EphemeralCache::new();
    let mut hook = fx
      .hook_with(fx.adapter(), Duration::ZERO, true)
      .with_prefetch(prefetch.clone());
    let page_two = hook.adapter().build_key(&scope(), &KeyParams::page(2));

    hook.apply_params(KeyParams::page(1));
    settle(&mut hook, 10).await;
    settle(&mut hook, 10).await;
    assert!(prefetch.has(&page_two));

    fx.fail.store(true, Ordering::SeqCst);
    hook.invalidate();
    assert!(!prefetch.has(&page_two));
  }

  #[tokio::test]
  async fn test_prefetch_finishing_after_refresh_is_dropped() {
    let fx = Fixture::new();
    fx.page_two_delay_ms.store(40, Ordering::SeqCst);
    let prefetch = EphemeralCache::new();
    let mut hook = fx
      .hook_with(fx.adapter(), Duration::ZERO, true)
      .with_prefetch(prefetch.clone());
    let page_two = hook.adapter().build_key(&scope(), &KeyParams::page(2));

    hook.apply_params(KeyParams::page(1));
    settle(&mut hook, 10).await;
    assert_eq!(fx.calls(), 2);

    // Refresh fails, so nothing prefetches page 2 again
    fx.fail.store(true, Ordering::SeqCst);
    hook.handle_manual_refresh();
    settle(&mut hook, 10).await;
    assert_eq!(hook.error(), Some("network down"));

    settle(&mut hook, 60).await;
    assert!(!prefetch.has(&page_two));
  }

  #[tokio::test]
  async fn test_paging_follows_has_next() {
    let fx = Fixture::new();
    let mut hook = fx.hook().with_params(KeyParams::page(1));

    // Nothing loaded yet, so there is no known next page
    assert!(!hook.next_page());
    assert!(!hook.prev_page());

    let mut paged = fx
      .hook_with(fx.adapter(), Duration::ZERO, true)
      .with_params(KeyParams::page(1));
    paged.load(false);
    settle(&mut paged, 10).await;

    assert!(paged.next_page());
    assert!(paged.next_page());
    assert_eq!(paged.page(), Some(3));
    assert!(paged.prev_page());
    assert_eq!(paged.page(), Some(2));

    settle(&mut paged, 60).await;
    assert_eq!(paged.params().page, Some(2));
  }

  #[tokio::test]
  async fn test_unpaginated_hook_ignores_paging() {
    let fx = Fixture::new();
    let mut hook = fx.hook();
    hook.load(false);
    settle(&mut hook, 10).await;
    assert!(!hook.next_page());
    assert_eq!(hook.page(), None);
  }

  #[tokio::test]
  async fn test_invalidate_refetches() {
    let fx = Fixture::new();
    let mut hook = fx.hook();
    hook.load(false);
    settle(&mut hook, 10).await;

    hook.invalidate();
    assert!(hook.is_refreshing());
    settle(&mut hook, 10).await;
    assert_eq!(hook.data().unwrap().items, vec!["v2"]);
  }
}

//! Core traits and types for domain caching.

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Who the cached data belongs to.
///
/// Folded into every key so that different admins never read each other's
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheScope {
  pub role: String,
  pub college: Option<String>,
  pub department: Option<String>,
}

impl CacheScope {
  pub fn new(role: impl Into<String>) -> Self {
    Self {
      role: role.into(),
      college: None,
      department: None,
    }
  }

  pub fn with_college(mut self, college: impl Into<String>) -> Self {
    self.college = Some(college.into());
    self
  }

  pub fn with_department(mut self, department: impl Into<String>) -> Self {
    self.department = Some(department.into());
    self
  }

  /// Key segment: `role[_college][_department]`.
  pub fn segment(&self) -> String {
    let mut segment = self.role.clone();
    for part in [&self.college, &self.department].into_iter().flatten() {
      segment.push('_');
      segment.push_str(part);
    }
    segment
  }
}

/// Query parameters that distinguish entries within a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyParams {
  pub page: Option<u32>,
  pub filters: BTreeMap<String, String>,
}

impl KeyParams {
  pub fn page(page: u32) -> Self {
    Self {
      page: Some(page),
      ..Self::default()
    }
  }

  pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.filters.insert(name.into(), value.into());
    self
  }

  /// Stable digest of the non-empty filters, or `None` when there are none.
  ///
  /// Values are trimmed and lowercased so that `" Paid"` and `"paid"` share
  /// an entry.
  pub fn filter_digest(&self) -> Option<String> {
    let normalized: Vec<String> = self
      .filters
      .iter()
      .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
      .filter(|(_, v)| !v.is_empty())
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();

    if normalized.is_empty() {
      return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.join("&").as_bytes());
    Some(hex::encode(hasher.finalize())[..12].to_string())
  }
}

/// A cached data domain: its key namespace and its optimizer.
///
/// `Raw` is the API payload; `Cached` is the reduced projection that is
/// stored and rendered.
pub trait CacheDomain: Send + Sync + 'static {
  type Raw: DeserializeOwned + Send + 'static;
  type Cached: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

  /// Prefix shared by every key of this domain, without a trailing `_`.
  const PREFIX: &'static str;

  /// Name of the resource within a namespace (e.g. "stats", "list").
  const RESOURCE: &'static str;

  /// Prefix of all keys for one scope. Invalidated as a unit.
  fn namespace(scope: &CacheScope) -> String {
    format!("{}_{}_", Self::PREFIX, scope.segment())
  }

  /// Deterministic key for one scope and parameter set.
  fn build_key(scope: &CacheScope, params: &KeyParams) -> String {
    let mut key = Self::namespace(scope);
    key.push_str(Self::RESOURCE);
    if let Some(page) = params.page {
      key.push_str(&format!("_p{}", page));
    }
    if let Some(digest) = params.filter_digest() {
      key.push_str(&format!("_f{}", digest));
    }
    key
  }

  /// Reduce a full payload to the fields the dashboard renders.
  fn optimize(raw: &Self::Raw) -> Self::Cached;

  /// Whether `data` was loaded from a page that has a successor.
  fn has_next_page(_data: &Self::Cached) -> bool {
    false
  }
}

/// Where the data a hook is showing came from, as reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
  /// Served from, or just written to, a valid cache entry
  Fresh,
  /// Showing older data while a refresh is pending or after it failed
  Stale,
  /// Not backed by the cache
  #[default]
  Uncached,
}

impl fmt::Display for CacheStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      CacheStatus::Fresh => "fresh",
      CacheStatus::Stale => "stale",
      CacheStatus::Uncached => "none",
    };
    f.write_str(label)
  }
}

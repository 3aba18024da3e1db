//! Non-interactive subcommands: cache maintenance and recording expenses.

use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::info;

use crate::api::api_types::NewExpense;
use crate::api::cache::{
  CollegeStatsDomain, DashboardDomain, DepartmentStatsDomain, ExecutivesDomain, ExpensesDomain,
  PaymentsDomain,
};
use crate::cache::{CacheStats, ClearTarget, PersistentCache};
use crate::hooks::HookContext;

/// Stats for every domain namespace, in display order.
pub fn collect_stats(context: &HookContext) -> Vec<CacheStats> {
  vec![
    context.adapter::<DashboardDomain>().stats(),
    context.adapter::<CollegeStatsDomain>().stats(),
    context.adapter::<DepartmentStatsDomain>().stats(),
    context.adapter::<PaymentsDomain>().stats(),
    context.adapter::<ExpensesDomain>().stats(),
    context.adapter::<ExecutivesDomain>().stats(),
  ]
}

pub fn cache_stats(context: &HookContext) -> Result<()> {
  println!(
    "{:<16} {:>8} {:>8} {:>8} {:>8} {:>10}",
    "NAMESPACE", "ENTRIES", "VALID", "EXPIRED", "CORRUPT", "BYTES"
  );
  for stats in collect_stats(context) {
    println!(
      "{:<16} {:>8} {:>8} {:>8} {:>8} {:>10}",
      stats.namespace, stats.entries, stats.valid, stats.expired, stats.corrupt, stats.bytes
    );
  }

  let total = context
    .store()
    .len()
    .map_err(|e| eyre!("Failed to read cache store: {}", e))?;
  println!("\n{} keys in store", total);
  Ok(())
}

/// Clear keys starting with `prefix`, or every dashboard namespace.
pub fn clear_cache(context: &HookContext, prefix: Option<&str>) -> usize {
  match prefix {
    Some(prefix) => {
      PersistentCache::new(context.store().clone(), "").clear(ClearTarget::Prefix(prefix))
    }
    None => {
      context.adapter::<DashboardDomain>().invalidate_all()
        + context.adapter::<CollegeStatsDomain>().invalidate_all()
        + context.adapter::<DepartmentStatsDomain>().invalidate_all()
        + context.adapter::<PaymentsDomain>().invalidate_all()
        + context.adapter::<ExpensesDomain>().invalidate_all()
        + context.adapter::<ExecutivesDomain>().invalidate_all()
    }
  }
}

pub fn cache_clear(context: &HookContext, prefix: Option<&str>) -> Result<()> {
  let removed = clear_cache(context, prefix);
  info!(?prefix, removed, "Cache cleared");
  println!("Removed {} cache entries", removed);
  Ok(())
}

/// Record an expense, then invalidate what it changes and reload the
/// expense list so the next dashboard start is warm.
pub async fn expense_add(
  context: &HookContext,
  expense: NewExpense,
  timeout: Duration,
) -> Result<()> {
  context.client().create_expense(&expense).await?;
  println!("Recorded expense \"{}\"", expense.title);

  // Totals on the overview screens include expenses
  let scope = context.scope();
  context.adapter::<DashboardDomain>().invalidate_namespace(scope);
  context.adapter::<CollegeStatsDomain>().invalidate_namespace(scope);
  context.adapter::<DepartmentStatsDomain>().invalidate_namespace(scope);

  let mut hook = context.expenses();
  hook.invalidate();

  let reloaded = tokio::time::timeout(timeout, async {
    while hook.is_in_flight() {
      tokio::time::sleep(Duration::from_millis(50)).await;
      hook.poll();
    }
  })
  .await;

  match (reloaded, hook.error()) {
    (Ok(()), None) => println!("Expense list refreshed"),
    (Ok(()), Some(e)) => println!("Expense list will refresh on next start ({})", e),
    (Err(_), _) => println!("Expense list will refresh on next start"),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{ExpensesPage, StatsSummary};
  use crate::api::ApiClient;
  use crate::cache::{CacheScope, KeyParams, MemoryStore, SharedStore};
  use crate::config::CacheConfig;
  use std::sync::Arc;

  fn context(store: SharedStore) -> HookContext {
    let client =
      ApiClient::with_token("http://127.0.0.1:9/api", Duration::from_secs(1), None).unwrap();
    HookContext::new(
      client,
      store,
      CacheConfig::default(),
      CacheScope::new("dept_admin").with_department("CYDASA"),
    )
  }

  fn seed(context: &HookContext) {
    let scope = context.scope().clone();
    let expenses = context.adapter::<ExpensesDomain>();
    expenses.write_optimized(
      &expenses.build_key(&scope, &KeyParams::page(1)),
      &ExpensesPage::default(),
    );
    let stats = context.adapter::<DepartmentStatsDomain>();
    stats.write_optimized(
      &stats.build_key(&scope, &KeyParams::default()),
      &StatsSummary::default(),
    );
  }

  #[test]
  fn test_collect_stats_covers_every_domain() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let ctx = context(store);
    seed(&ctx);

    let stats = collect_stats(&ctx);
    assert_eq!(stats.len(), 6);
    let expenses = stats.iter().find(|s| s.namespace == "expenses_").unwrap();
    assert_eq!(expenses.entries, 1);
    assert_eq!(expenses.valid, 1);
  }

  #[test]
  fn test_clear_all_leaves_foreign_keys() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    store.set_item("theme", "dark").unwrap();
    let ctx = context(store.clone());
    seed(&ctx);

    assert_eq!(clear_cache(&ctx, None), 2);
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.get_item("theme").unwrap().as_deref(), Some("dark"));
  }

  #[test]
  fn test_clear_prefix() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let ctx = context(store.clone());
    seed(&ctx);

    assert_eq!(clear_cache(&ctx, Some("dept_admin_CYDASA_")), 1);
    assert_eq!(store.len().unwrap(), 1);
  }
}

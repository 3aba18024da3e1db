use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;

use crate::cache::{CacheDomain, CacheStatus};
use crate::hooks::{DataHook, HookState};

use super::table::{draw_table, TableView};

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What the status bar shows for the active panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelStatus {
  pub cache_status: CacheStatus,
  pub last_updated: Option<DateTime<Utc>>,
  pub loading: bool,
  pub refreshing: bool,
  pub cache_available: bool,
  pub page: Option<u32>,
  pub error: Option<String>,
  pub notice: Option<String>,
}

/// Trait for dashboard tabs
///
/// Panels own their data hook, poll it in `tick()` and render whatever it
/// currently holds. The App only routes input and focus changes.
pub trait Panel {
  fn title(&self) -> &str;

  /// Called when the panel becomes the active tab
  fn activate(&mut self);

  /// Poll async work; returns true if a redraw is needed
  fn tick(&mut self) -> bool;

  /// Handle a key event, returning whether it was consumed
  fn handle_key(&mut self, key: KeyEvent) -> bool;

  /// The terminal regained focus
  fn on_focus_gained(&mut self) -> bool;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn status(&self) -> PanelStatus;

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    base_shortcuts()
  }
}

fn base_shortcuts() -> Vec<ShortcutInfo> {
  vec![
    ShortcutInfo::new("tab", "switch").with_priority(10),
    ShortcutInfo::new("r", "refresh").with_priority(20),
    ShortcutInfo::new("q", "quit").with_priority(90),
  ]
}

/// A panel that renders one hook's data as a table.
pub struct HookPanel<D: CacheDomain> {
  title: &'static str,
  hook: DataHook<D>,
  selected: usize,
  activated: bool,
}

impl<D: CacheDomain> HookPanel<D>
where
  D::Cached: TableView,
{
  pub fn new(title: &'static str, hook: DataHook<D>) -> Self {
    Self {
      title,
      hook,
      selected: 0,
      activated: false,
    }
  }

  pub fn hook(&self) -> &DataHook<D> {
    &self.hook
  }

  fn row_count(&self) -> usize {
    self.hook.data().map(|d| d.rows().len()).unwrap_or(0)
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.row_count();
    if len == 0 {
      self.selected = 0;
      return;
    }
    let next = (self.selected as i32 + delta).clamp(0, len as i32 - 1);
    self.selected = next as usize;
  }
}

impl<D: CacheDomain> Panel for HookPanel<D>
where
  D::Cached: TableView,
{
  fn title(&self) -> &str {
    self.title
  }

  fn activate(&mut self) {
    if !self.activated {
      self.activated = true;
      self.hook.load(false);
    }
  }

  fn tick(&mut self) -> bool {
    self.hook.poll()
  }

  fn handle_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('r') => {
        self.hook.handle_manual_refresh();
        true
      }
      KeyCode::Char('n') | KeyCode::Right => {
        if self.hook.next_page() {
          self.selected = 0;
        }
        true
      }
      KeyCode::Char('p') | KeyCode::Left => {
        if self.hook.prev_page() {
          self.selected = 0;
        }
        true
      }
      KeyCode::Char('j') | KeyCode::Down => {
        self.move_selection(1);
        true
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.move_selection(-1);
        true
      }
      KeyCode::Esc => {
        self.hook.dismiss_notice();
        true
      }
      _ => false,
    }
  }

  fn on_focus_gained(&mut self) -> bool {
    // Tabs never shown have nothing to refresh
    self.activated && self.hook.on_visibility_regained()
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let placeholder = match self.hook.state() {
      HookState::Idle | HookState::Loading => "Loading...".to_string(),
      HookState::Error(e) => format!("Failed to load: {}\n\nPress r to retry.", e),
      HookState::Ready(_) => String::new(),
    };
    draw_table(
      frame,
      area,
      self.title,
      self.hook.data(),
      &placeholder,
      self.selected,
    );
  }

  fn status(&self) -> PanelStatus {
    PanelStatus {
      cache_status: self.hook.cache_status(),
      last_updated: self.hook.last_updated(),
      loading: self.hook.is_loading(),
      refreshing: self.hook.is_refreshing(),
      cache_available: self.hook.cache_available(),
      page: self.hook.page(),
      error: self.hook.error().map(str::to_string),
      notice: self.hook.notice().map(str::to_string),
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = base_shortcuts();
    if self.hook.page().is_some() {
      shortcuts.push(ShortcutInfo::new("n/p", "page").with_priority(30));
    }
    shortcuts.sort_by_key(|s| s.priority);
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::api_types::ApiPaymentsPage;
  use crate::api::cache::PaymentsDomain;
  use crate::api::types::{Pagination, PaymentsPage};
  use crate::cache::{CacheScope, DomainCache, KeyParams, MemoryStore, SharedStore};
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;
  use std::time::Duration;

  fn panel() -> HookPanel<PaymentsDomain> {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let adapter = DomainCache::<PaymentsDomain>::new(store, Duration::from_secs(300));
    let hook = DataHook::new(
      adapter,
      CacheScope::new("super_admin"),
      |_params| async { Ok::<_, color_eyre::Report>(ApiPaymentsPage::default()) },
    )
    .with_params(KeyParams::page(1));
    HookPanel::new("Payments", hook)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_activate_loads_once() {
    let mut panel = panel();
    assert!(panel.status().cache_status == CacheStatus::Uncached);

    panel.activate();
    assert!(panel.status().loading);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(panel.tick());
    assert!(!panel.status().loading);

    panel.activate();
    assert_eq!(panel.hook().fetch_count(), 1);
  }

  #[tokio::test]
  async fn test_focus_ignored_until_activated() {
    let mut panel = panel();
    assert!(!panel.on_focus_gained());
    assert_eq!(panel.hook().fetch_count(), 0);
  }

  #[tokio::test]
  async fn test_selection_is_clamped() {
    let mut panel = panel();
    assert!(panel.handle_key(key(KeyCode::Down)));
    assert_eq!(panel.selected, 0);
    assert!(!panel.handle_key(key(KeyCode::Char('x'))));
    assert_eq!(
      PaymentsPage {
        payments: vec![],
        pagination: Pagination::default()
      }
      .rows()
      .len(),
      0
    );
  }

  #[test]
  fn test_paginated_panel_advertises_paging() {
    let panel = panel();
    assert!(panel.shortcuts().iter().any(|s| s.key == "n/p"));
  }
}

use crate::api::ApiClient;
use crate::config::{Config, Role};
use crate::event::{Event, EventHandler};
use crate::hooks::HookContext;
use crate::ui::{self, HookPanel, Panel};
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

/// Main application state
pub struct App {
  /// One panel per tab; the overview is always first
  panels: Vec<Box<dyn Panel>>,

  active: usize,

  /// Application configuration
  config: Config,

  /// Whether the terminal currently has focus
  focused: bool,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, client: ApiClient) -> Self {
    let context = HookContext::from_config(&config, client);
    let panels = Self::build_panels(&context, config.session.role);

    Self {
      panels,
      active: 0,
      config,
      focused: true,
      should_quit: false,
    }
  }

  fn build_panels(context: &HookContext, role: Role) -> Vec<Box<dyn Panel>> {
    let overview: Box<dyn Panel> = match role {
      Role::SuperAdmin | Role::FinanceDirector => {
        Box::new(HookPanel::new("Overview", context.dashboard()))
      }
      Role::CollegeAdmin => Box::new(HookPanel::new("College", context.college_stats())),
      Role::DepartmentAdmin => Box::new(HookPanel::new("Department", context.department_stats())),
    };

    vec![
      overview,
      Box::new(HookPanel::new("Payments", context.payments())),
      Box::new(HookPanel::new("Expenses", context.expenses())),
      Box::new(HookPanel::new("Executives", context.executives())),
    ]
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));

    info!(role = %self.config.session.role, "Dashboard started");
    self.panels[self.active].activate();

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        // Poll every panel so background refreshes land on hidden tabs too
        for panel in &mut self.panels {
          panel.tick();
        }
      }
      Event::FocusGained => self.on_focus_gained(),
      Event::FocusLost => self.focused = false,
      Event::Resize => {}
    }
  }

  fn on_focus_gained(&mut self) {
    if self.focused {
      return;
    }
    self.focused = true;

    let refreshed = self
      .panels
      .iter_mut()
      .filter_map(|panel| panel.on_focus_gained().then(|| panel.title().to_string()))
      .collect::<Vec<_>>();
    if !refreshed.is_empty() {
      debug!(?refreshed, "Refreshing expired panels after focus regained");
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Tab => self.select_tab((self.active + 1) % self.panels.len()),
      KeyCode::BackTab => {
        self.select_tab((self.active + self.panels.len() - 1) % self.panels.len())
      }
      KeyCode::Char(c @ '1'..='9') => {
        let index = c as usize - '1' as usize;
        if index < self.panels.len() {
          self.select_tab(index);
        }
      }
      _ => {
        self.panels[self.active].handle_key(key);
      }
    }
  }

  fn select_tab(&mut self, index: usize) {
    self.active = index;
    self.panels[index].activate();
  }

  // ===== Accessors for UI =====

  pub fn panels(&self) -> &[Box<dyn Panel>] {
    &self.panels
  }

  pub fn active_index(&self) -> usize {
    self.active
  }

  pub fn active_panel(&self) -> &dyn Panel {
    self.panels[self.active].as_ref()
  }

  pub fn active_panel_mut(&mut self) -> &mut dyn Panel {
    self.panels[self.active].as_mut()
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.base_url
  }

  pub fn scope_label(&self) -> String {
    self.config.session.scope().segment()
  }
}

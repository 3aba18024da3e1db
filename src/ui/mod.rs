pub mod panel;
pub mod renderfns;
pub mod table;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::Tabs;

pub use panel::{HookPanel, Panel, PanelStatus, ShortcutInfo};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(1), // Tabs
      Constraint::Min(1),    // Active panel
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  let shortcuts = app.active_panel().shortcuts();
  renderfns::draw_header(frame, chunks[0], app.api_url(), &app.scope_label(), &shortcuts);

  draw_tabs(frame, chunks[1], app);

  let status = app.active_panel().status();
  app.active_panel_mut().render(frame, chunks[2]);

  renderfns::draw_footer(frame, chunks[3], &status);
}

fn draw_tabs(frame: &mut Frame, area: Rect, app: &App) {
  let titles: Vec<String> = app
    .panels()
    .iter()
    .enumerate()
    .map(|(i, panel)| format!(" {} {} ", i + 1, panel.title()))
    .collect();

  let tabs = Tabs::new(titles)
    .select(app.active_index())
    .style(Style::default().fg(Color::DarkGray))
    .highlight_style(Style::default().fg(Color::Cyan).bold())
    .divider("│");

  frame.render_widget(tabs, area);
}

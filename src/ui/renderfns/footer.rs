use chrono::Utc;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::cache::CacheStatus;
use crate::ui::panel::PanelStatus;

use super::utils::format_age;

/// Draw the status bar: cache status, data age, paging and any message
pub fn draw_footer(frame: &mut Frame, area: Rect, status: &PanelStatus) {
  let mut spans = vec![Span::raw(" ")];

  let (label, color) = match status.cache_status {
    CacheStatus::Fresh => ("fresh", Color::Green),
    CacheStatus::Stale => ("stale", Color::Yellow),
    CacheStatus::Uncached => ("none", Color::DarkGray),
  };
  spans.push(Span::styled("cache ", Style::default().fg(Color::DarkGray)));
  spans.push(Span::styled(label, Style::default().fg(color).bold()));

  if let Some(updated) = status.last_updated {
    spans.push(Span::styled(
      format!("  updated {}", format_age(updated, Utc::now())),
      Style::default().fg(Color::DarkGray),
    ));
  }

  if let Some(page) = status.page {
    spans.push(Span::styled(
      format!("  page {}", page),
      Style::default().fg(Color::White),
    ));
  }

  if status.loading {
    spans.push(Span::styled("  loading...", Style::default().fg(Color::Cyan)));
  } else if status.refreshing {
    spans.push(Span::styled("  refreshing...", Style::default().fg(Color::Cyan)));
  }

  if !status.cache_available {
    spans.push(Span::styled("  [cache off]", Style::default().fg(Color::Yellow)));
  }

  // Errors win over notices
  if let Some(error) = &status.error {
    spans.push(Span::styled(
      format!("  {}", error),
      Style::default().fg(Color::Red),
    ));
  } else if let Some(notice) = &status.notice {
    spans.push(Span::styled(
      format!("  {}", notice),
      Style::default().fg(Color::Yellow),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

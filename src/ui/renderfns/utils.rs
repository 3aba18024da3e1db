use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a payment status
pub fn status_color(status: &str) -> Color {
  match status.to_ascii_lowercase().as_str() {
    "successful" | "success" | "paid" | "verified" => Color::Green,
    "pending" | "processing" => Color::Yellow,
    "failed" | "reversed" | "cancelled" => Color::Red,
    _ => Color::White,
  }
}

/// Money with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
  let negative = amount < 0.0;
  let fixed = format!("{:.2}", amount.abs());
  let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

  let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
  for (i, c) in whole.chars().enumerate() {
    if i > 0 && (whole.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  format!("{}{}.{}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Short relative age, e.g. "just now", "4m ago"
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - then).num_seconds().max(0);
  match secs {
    0..=9 => "just now".to_string(),
    10..=59 => format!("{}s ago", secs),
    60..=3599 => format!("{}m ago", secs / 60),
    3600..=86399 => format!("{}h ago", secs / 3600),
    _ => format!("{}d ago", secs / 86400),
  }
}

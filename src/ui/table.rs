//! Tabular rendering of cached domain projections.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::api::types::{
  DashboardView, ExecutivesList, ExpensesPage, Pagination, PaymentsPage, StatsSummary,
};

use super::renderfns::{format_amount, status_color, truncate};

/// A projection that can be shown as a table.
pub trait TableView {
  fn headers() -> Vec<&'static str>;

  fn widths() -> Vec<Constraint>;

  fn rows(&self) -> Vec<Row<'static>>;

  /// One-line summary shown above the table
  fn caption(&self) -> Option<String> {
    None
  }

  /// Text shown when there are no rows
  fn empty_text() -> &'static str {
    "Nothing to show."
  }
}

fn page_caption(pagination: &Pagination, noun: &str) -> String {
  format!(
    "Page {} of {} · {} {}",
    pagination.page,
    pagination.total_pages.max(1),
    pagination.total,
    noun
  )
}

fn stats_caption(stats: &StatsSummary) -> String {
  format!(
    "Students {} · Paid {} ({:.1}%) · Collected {} · Spent {} · Balance {}",
    stats.total_students,
    stats.paid_students,
    stats.compliance_rate(),
    format_amount(stats.total_payments),
    format_amount(stats.total_expenses),
    format_amount(stats.balance),
  )
}

fn opt(value: &Option<String>) -> String {
  value.clone().unwrap_or_else(|| "-".to_string())
}

impl TableView for PaymentsPage {
  fn headers() -> Vec<&'static str> {
    vec!["Reference", "Student", "Matric No.", "Amount", "Status", "Method", "Department", "Date"]
  }

  fn widths() -> Vec<Constraint> {
    vec![
      Constraint::Length(16),
      Constraint::Min(18),
      Constraint::Length(14),
      Constraint::Length(14),
      Constraint::Length(11),
      Constraint::Length(10),
      Constraint::Length(14),
      Constraint::Length(12),
    ]
  }

  fn rows(&self) -> Vec<Row<'static>> {
    self
      .payments
      .iter()
      .map(|p| {
        Row::new(vec![
          Cell::from(truncate(&p.reference, 16)).style(Style::default().fg(Color::Cyan)),
          Cell::from(truncate(&p.student.name, 30)),
          Cell::from(p.student.matric_number.clone()),
          Cell::from(format_amount(p.amount)),
          Cell::from(p.status.clone()).style(Style::default().fg(status_color(&p.status))),
          Cell::from(p.payment_method.clone()),
          Cell::from(truncate(&p.department, 14)),
          Cell::from(truncate(&p.date, 10)),
        ])
      })
      .collect()
  }

  fn caption(&self) -> Option<String> {
    Some(page_caption(&self.pagination, "payments"))
  }

  fn empty_text() -> &'static str {
    "No payments found."
  }
}

impl TableView for ExpensesPage {
  fn headers() -> Vec<&'static str> {
    vec!["Title", "Amount", "Type", "Department", "Account", "Method", "Date", "Recorded by"]
  }

  fn widths() -> Vec<Constraint> {
    vec![
      Constraint::Min(20),
      Constraint::Length(14),
      Constraint::Length(12),
      Constraint::Length(14),
      Constraint::Length(12),
      Constraint::Length(10),
      Constraint::Length(12),
      Constraint::Length(18),
    ]
  }

  fn rows(&self) -> Vec<Row<'static>> {
    self
      .expenses
      .iter()
      .map(|e| {
        Row::new(vec![
          Cell::from(truncate(&e.title, 40)),
          Cell::from(format_amount(e.amount)).style(Style::default().fg(Color::Red)),
          Cell::from(e.expense_type.clone()),
          Cell::from(truncate(&e.department, 14)),
          Cell::from(truncate(&e.account, 12)),
          Cell::from(e.payment_method.clone()),
          Cell::from(truncate(&e.date, 10)),
          Cell::from(format!("{} ({})", e.created_by.name, e.created_by.role)),
        ])
      })
      .collect()
  }

  fn caption(&self) -> Option<String> {
    Some(page_caption(&self.pagination, "expenses"))
  }

  fn empty_text() -> &'static str {
    "No expenses recorded."
  }
}

impl TableView for ExecutivesList {
  fn headers() -> Vec<&'static str> {
    vec!["Name", "Position", "Department", "College", "Email", "Phone"]
  }

  fn widths() -> Vec<Constraint> {
    vec![
      Constraint::Min(20),
      Constraint::Length(22),
      Constraint::Length(14),
      Constraint::Length(10),
      Constraint::Length(28),
      Constraint::Length(15),
    ]
  }

  fn rows(&self) -> Vec<Row<'static>> {
    self
      .executives
      .iter()
      .map(|e| {
        Row::new(vec![
          Cell::from(e.name.clone()).style(Style::default().fg(Color::Cyan)),
          Cell::from(e.position.clone()),
          Cell::from(opt(&e.department)),
          Cell::from(opt(&e.college)),
          Cell::from(opt(&e.email)),
          Cell::from(opt(&e.phone)),
        ])
      })
      .collect()
  }

  fn caption(&self) -> Option<String> {
    Some(format!("{} executives", self.executives.len()))
  }

  fn empty_text() -> &'static str {
    "No executives on record."
  }
}

impl TableView for StatsSummary {
  fn headers() -> Vec<&'static str> {
    vec!["Department", "Students", "Paid", "Compliance", "Collected"]
  }

  fn widths() -> Vec<Constraint> {
    vec![
      Constraint::Min(20),
      Constraint::Length(10),
      Constraint::Length(10),
      Constraint::Length(12),
      Constraint::Length(16),
    ]
  }

  fn rows(&self) -> Vec<Row<'static>> {
    self
      .departments
      .iter()
      .map(|d| {
        let rate = if d.students == 0 {
          0.0
        } else {
          d.paid as f64 * 100.0 / d.students as f64
        };
        Row::new(vec![
          Cell::from(d.department.clone()),
          Cell::from(d.students.to_string()),
          Cell::from(d.paid.to_string()),
          Cell::from(format!("{:.1}%", rate)),
          Cell::from(format_amount(d.amount)),
        ])
      })
      .collect()
  }

  fn caption(&self) -> Option<String> {
    Some(stats_caption(self))
  }

  fn empty_text() -> &'static str {
    "No department breakdown available."
  }
}

impl TableView for DashboardView {
  fn headers() -> Vec<&'static str> {
    vec!["", "Description", "Amount", "Department", "Date"]
  }

  fn widths() -> Vec<Constraint> {
    vec![
      Constraint::Length(3),
      Constraint::Min(24),
      Constraint::Length(14),
      Constraint::Length(14),
      Constraint::Length(12),
    ]
  }

  /// Recent payments followed by recent expenses
  fn rows(&self) -> Vec<Row<'static>> {
    let payments = self.recent_payments.iter().map(|p| {
      Row::new(vec![
        Cell::from("+").style(Style::default().fg(Color::Green)),
        Cell::from(format!("{} ({})", truncate(&p.student.name, 30), p.status)),
        Cell::from(format_amount(p.amount)).style(Style::default().fg(Color::Green)),
        Cell::from(truncate(&p.department, 14)),
        Cell::from(truncate(&p.date, 10)),
      ])
    });
    let expenses = self.recent_expenses.iter().map(|e| {
      Row::new(vec![
        Cell::from("-").style(Style::default().fg(Color::Red)),
        Cell::from(truncate(&e.title, 40)),
        Cell::from(format_amount(e.amount)).style(Style::default().fg(Color::Red)),
        Cell::from(truncate(&e.department, 14)),
        Cell::from(truncate(&e.date, 10)),
      ])
    });
    payments.chain(expenses).collect()
  }

  fn caption(&self) -> Option<String> {
    Some(stats_caption(&self.stats))
  }

  fn empty_text() -> &'static str {
    "No recent activity."
  }
}

/// Render `data` (or a placeholder) as a bordered table.
pub fn draw_table<T: TableView>(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  data: Option<&T>,
  placeholder: &str,
  selected: usize,
) {
  let block = Block::default()
    .title(format!(" {} ", title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(data) = data else {
    let paragraph = Paragraph::new(placeholder.to_string())
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let inner = block.inner(area);
  frame.render_widget(block, area);

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(1)])
    .split(inner);

  if let Some(caption) = data.caption() {
    frame.render_widget(
      Paragraph::new(caption).style(Style::default().fg(Color::Yellow)),
      chunks[0],
    );
  }

  let rows = data.rows();
  if rows.is_empty() {
    frame.render_widget(
      Paragraph::new(T::empty_text()).style(Style::default().fg(Color::DarkGray)),
      chunks[1],
    );
    return;
  }

  let header = Row::new(T::headers()).style(Style::default().fg(Color::White).bold());
  let selected = selected.min(rows.len() - 1);
  let table = Table::new(rows, T::widths())
    .header(header)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = TableState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(table, chunks[1], &mut state);
}

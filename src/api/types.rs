//! Cached projections of API payloads.
//!
//! Field names match the API payloads so a projection parses back into its
//! payload type; that is what keeps the optimizers idempotent.

use serde::{Deserialize, Serialize};

/// Student fields shown next to a payment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
  pub name: String,
  pub matric_number: String,
}

/// Payment row for list views
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
  pub reference: String,
  pub student: StudentRef,
  pub amount: f64,
  pub status: String,
  pub payment_method: String,
  pub department: String,
  pub date: String,
}

/// Who recorded an expense
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creator {
  pub name: String,
  pub role: String,
}

/// Expense row for list views
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRow {
  pub title: String,
  pub amount: f64,
  #[serde(rename = "type")]
  pub expense_type: String,
  pub department: String,
  pub account: String,
  pub payment_method: String,
  pub date: String,
  pub created_by: Creator,
}

/// Executive row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveRow {
  pub name: String,
  pub position: String,
  pub department: Option<String>,
  pub college: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub page: u32,
  pub limit: u32,
  pub total: u64,
  pub total_pages: u32,
}

impl Pagination {
  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentsPage {
  pub payments: Vec<PaymentRow>,
  pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpensesPage {
  pub expenses: Vec<ExpenseRow>,
  pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutivesList {
  pub executives: Vec<ExecutiveRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentTotal {
  pub department: String,
  pub students: u64,
  pub paid: u64,
  pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
  pub month: String,
  pub payments: f64,
  pub expenses: f64,
}

/// Headline numbers for a stats screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
  pub total_students: u64,
  pub paid_students: u64,
  pub total_payments: f64,
  pub total_expenses: f64,
  pub balance: f64,
  pub payment_count: u64,
  pub departments: Vec<DepartmentTotal>,
  pub monthly: Vec<MonthlyTotal>,
}

impl StatsSummary {
  /// Share of students who have paid, in percent.
  pub fn compliance_rate(&self) -> f64 {
    if self.total_students == 0 {
      return 0.0;
    }
    self.paid_students as f64 * 100.0 / self.total_students as f64
  }
}

/// Overview screen for the super admin and finance director
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
  pub stats: StatsSummary,
  pub recent_payments: Vec<PaymentRow>,
  pub recent_expenses: Vec<ExpenseRow>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_compliance_rate() {
    let stats = StatsSummary {
      total_students: 200,
      paid_students: 150,
      ..StatsSummary::default()
    };
    assert_eq!(stats.compliance_rate(), 75.0);
    assert_eq!(StatsSummary::default().compliance_rate(), 0.0);
  }

  #[test]
  fn test_pagination_has_next() {
    let mut pagination = Pagination {
      page: 1,
      limit: 20,
      total: 45,
      total_pages: 3,
    };
    assert!(pagination.has_next());
    pagination.page = 3;
    assert!(!pagination.has_next());
  }
}

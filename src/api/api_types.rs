//! Payload types as returned by the dues API.
//!
//! These carry more than the dashboard renders; the domain optimizers in
//! [`super::cache`] reduce them before anything is cached. Every field
//! defaults so that partial payloads (and cached projections) parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiUserRef {
  pub id: Option<String>,
  pub name: String,
  pub role: String,
  pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiStudent {
  pub id: Option<String>,
  pub name: String,
  pub matric_number: String,
  pub department: Option<String>,
  pub college: Option<String>,
  pub level: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiPayment {
  pub id: Option<String>,
  pub reference: String,
  pub student: ApiStudent,
  pub amount: f64,
  pub status: String,
  pub payment_method: String,
  pub department: String,
  pub college: Option<String>,
  pub session: Option<String>,
  pub date: String,
  pub description: Option<String>,
  pub receipt_url: Option<String>,
  pub metadata: Value,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiExpense {
  pub id: Option<String>,
  pub title: String,
  pub description: Option<String>,
  pub amount: f64,
  #[serde(rename = "type")]
  pub expense_type: String,
  pub department: String,
  pub account: String,
  pub payment_method: String,
  pub date: String,
  pub created_by: ApiUserRef,
  pub approved_by: Option<ApiUserRef>,
  pub attachments: Vec<String>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiExecutive {
  pub id: Option<String>,
  pub name: String,
  pub position: String,
  pub department: Option<String>,
  pub college: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub level: Option<String>,
  pub session: Option<String>,
  pub image_url: Option<String>,
  pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiPagination {
  pub page: u32,
  pub limit: u32,
  pub total: u64,
  pub total_pages: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiPaymentsPage {
  pub payments: Vec<ApiPayment>,
  pub pagination: ApiPagination,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiExpensesPage {
  pub expenses: Vec<ApiExpense>,
  pub pagination: ApiPagination,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiExecutivesResponse {
  pub executives: Vec<ApiExecutive>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiDepartmentBreakdown {
  pub department: String,
  pub students: u64,
  pub paid: u64,
  pub amount: f64,
  pub census: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiMonthlyTotal {
  pub month: String,
  pub payments: f64,
  pub expenses: f64,
}

/// Aggregate numbers for the whole association, a college, or a department.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiStatsResponse {
  pub total_students: u64,
  pub paid_students: u64,
  pub total_payments: f64,
  pub total_expenses: f64,
  pub balance: f64,
  pub payment_count: u64,
  pub departments: Vec<ApiDepartmentBreakdown>,
  pub monthly: Vec<ApiMonthlyTotal>,
  pub generated_at: Option<String>,
  pub debug: Value,
}

/// The overview screen, assembled from several concurrent requests.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardPayload {
  pub stats: ApiStatsResponse,
  pub recent_payments: Vec<ApiPayment>,
  pub recent_expenses: Vec<ApiExpense>,
}

/// Body for recording an expense.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
  pub title: String,
  pub amount: f64,
  #[serde(rename = "type")]
  pub expense_type: String,
  pub department: Option<String>,
  pub account: String,
  pub payment_method: String,
  pub description: Option<String>,
}

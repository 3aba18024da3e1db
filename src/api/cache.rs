//! Cache domains for dashboard data.
//!
//! Each domain names its key namespace and reduces its payload to the
//! fields the dashboard renders.

use crate::cache::{CacheDomain, CacheScope};

use super::api_types::{
  ApiDepartmentBreakdown, ApiExecutivesResponse, ApiExpense, ApiExpensesPage, ApiMonthlyTotal,
  ApiPagination, ApiPayment, ApiPaymentsPage, ApiStatsResponse, DashboardPayload,
};
use super::types::{
  Creator, DashboardView, DepartmentTotal, ExecutiveRow, ExecutivesList, ExpenseRow, ExpensesPage,
  MonthlyTotal, Pagination, PaymentRow, PaymentsPage, StatsSummary, StudentRef,
};

/// Number of recent payments and expenses kept on the overview.
pub const RECENT_LIMIT: usize = 5;

// ============================================================================
// Optimizers
// ============================================================================

fn payment_row(payment: &ApiPayment) -> PaymentRow {
  PaymentRow {
    reference: payment.reference.clone(),
    student: StudentRef {
      name: payment.student.name.clone(),
      matric_number: payment.student.matric_number.clone(),
    },
    amount: payment.amount,
    status: payment.status.clone(),
    payment_method: payment.payment_method.clone(),
    department: payment.department.clone(),
    date: payment.date.clone(),
  }
}

fn expense_row(expense: &ApiExpense) -> ExpenseRow {
  ExpenseRow {
    title: expense.title.clone(),
    amount: expense.amount,
    expense_type: expense.expense_type.clone(),
    department: expense.department.clone(),
    account: expense.account.clone(),
    payment_method: expense.payment_method.clone(),
    date: expense.date.clone(),
    created_by: Creator {
      name: expense.created_by.name.clone(),
      role: expense.created_by.role.clone(),
    },
  }
}

fn pagination(api: &ApiPagination) -> Pagination {
  Pagination {
    page: api.page,
    limit: api.limit,
    total: api.total,
    total_pages: api.total_pages,
  }
}

fn department_total(api: &ApiDepartmentBreakdown) -> DepartmentTotal {
  DepartmentTotal {
    department: api.department.clone(),
    students: api.students,
    paid: api.paid,
    amount: api.amount,
  }
}

fn monthly_total(api: &ApiMonthlyTotal) -> MonthlyTotal {
  MonthlyTotal {
    month: api.month.clone(),
    payments: api.payments,
    expenses: api.expenses,
  }
}

fn stats_summary(stats: &ApiStatsResponse) -> StatsSummary {
  StatsSummary {
    total_students: stats.total_students,
    paid_students: stats.paid_students,
    total_payments: stats.total_payments,
    total_expenses: stats.total_expenses,
    balance: stats.balance,
    payment_count: stats.payment_count,
    departments: stats.departments.iter().map(department_total).collect(),
    monthly: stats.monthly.iter().map(monthly_total).collect(),
  }
}

// ============================================================================
// Domains
// ============================================================================

/// Association-wide overview (super admin, finance director).
pub struct DashboardDomain;

impl CacheDomain for DashboardDomain {
  type Raw = DashboardPayload;
  type Cached = DashboardView;
  const PREFIX: &'static str = "dashboard";
  const RESOURCE: &'static str = "overview";

  fn optimize(raw: &DashboardPayload) -> DashboardView {
    DashboardView {
      stats: stats_summary(&raw.stats),
      recent_payments: raw
        .recent_payments
        .iter()
        .take(RECENT_LIMIT)
        .map(payment_row)
        .collect(),
      recent_expenses: raw
        .recent_expenses
        .iter()
        .take(RECENT_LIMIT)
        .map(expense_row)
        .collect(),
    }
  }
}

/// Stats for one college.
pub struct CollegeStatsDomain;

impl CacheDomain for CollegeStatsDomain {
  type Raw = ApiStatsResponse;
  type Cached = StatsSummary;
  const PREFIX: &'static str = "college_admin";
  const RESOURCE: &'static str = "stats";

  fn namespace(scope: &CacheScope) -> String {
    format!(
      "{}_{}_",
      Self::PREFIX,
      scope.college.as_deref().unwrap_or("all")
    )
  }

  fn optimize(raw: &ApiStatsResponse) -> StatsSummary {
    stats_summary(raw)
  }
}

/// Stats for one department.
pub struct DepartmentStatsDomain;

impl CacheDomain for DepartmentStatsDomain {
  type Raw = ApiStatsResponse;
  type Cached = StatsSummary;
  const PREFIX: &'static str = "dept_admin";
  const RESOURCE: &'static str = "stats";

  fn namespace(scope: &CacheScope) -> String {
    format!(
      "{}_{}_",
      Self::PREFIX,
      scope.department.as_deref().unwrap_or("all")
    )
  }

  fn optimize(raw: &ApiStatsResponse) -> StatsSummary {
    stats_summary(raw)
  }
}

/// Paginated payments.
pub struct PaymentsDomain;

impl CacheDomain for PaymentsDomain {
  type Raw = ApiPaymentsPage;
  type Cached = PaymentsPage;
  const PREFIX: &'static str = "payments";
  const RESOURCE: &'static str = "list";

  fn optimize(raw: &ApiPaymentsPage) -> PaymentsPage {
    PaymentsPage {
      payments: raw.payments.iter().map(payment_row).collect(),
      pagination: pagination(&raw.pagination),
    }
  }

  fn has_next_page(data: &PaymentsPage) -> bool {
    data.pagination.has_next()
  }
}

/// Paginated expenses.
pub struct ExpensesDomain;

impl CacheDomain for ExpensesDomain {
  type Raw = ApiExpensesPage;
  type Cached = ExpensesPage;
  const PREFIX: &'static str = "expenses";
  const RESOURCE: &'static str = "list";

  fn optimize(raw: &ApiExpensesPage) -> ExpensesPage {
    ExpensesPage {
      expenses: raw.expenses.iter().map(expense_row).collect(),
      pagination: pagination(&raw.pagination),
    }
  }

  fn has_next_page(data: &ExpensesPage) -> bool {
    data.pagination.has_next()
  }
}

/// Executives roster.
pub struct ExecutivesDomain;

impl CacheDomain for ExecutivesDomain {
  type Raw = ApiExecutivesResponse;
  type Cached = ExecutivesList;
  const PREFIX: &'static str = "executives";
  const RESOURCE: &'static str = "roster";

  fn optimize(raw: &ApiExecutivesResponse) -> ExecutivesList {
    ExecutivesList {
      executives: raw
        .executives
        .iter()
        .map(|e| ExecutiveRow {
          name: e.name.clone(),
          position: e.position.clone(),
          department: e.department.clone(),
          college: e.college.clone(),
          email: e.email.clone(),
          phone: e.phone.clone(),
        })
        .collect(),
    }
  }
}

//! HTTP client for the dues REST API.

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheScope, KeyParams};
use crate::config::Config;

use super::api_types::{
  ApiExecutivesResponse, ApiExpensesPage, ApiPaymentsPage, ApiStatsResponse, DashboardPayload,
  NewExpense,
};
use super::cache::RECENT_LIMIT;
use super::ApiError;

/// Rows requested per page for list endpoints.
pub const PAGE_SIZE: u32 = 20;

type Query = Vec<(String, String)>;

/// Dues API client.
/// Clone is cheap: the connection pool and the session token are shared.
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base_url: Url,
  token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let token = Config::get_api_token().ok();
    Ok(Self::with_token(
      &config.api.base_url,
      Duration::from_secs(config.api.timeout_secs),
      token,
    )?)
  }

  pub fn with_token(
    base_url: &str,
    timeout: Duration,
    token: Option<String>,
  ) -> Result<Self, ApiError> {
    // Url::join drops the last path segment unless the base ends in '/'
    let mut base_url = Url::parse(base_url)?;
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let http = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(ApiError::from_transport)?;

    Ok(Self {
      http,
      base_url,
      token: Arc::new(RwLock::new(token)),
    })
  }

  pub fn is_authenticated(&self) -> bool {
    self.token().is_some()
  }

  fn token(&self) -> Option<String> {
    self.token.read().ok().and_then(|t| t.clone())
  }

  fn clear_token(&self) {
    if let Ok(mut token) = self.token.write() {
      *token = None;
    }
  }

  fn url(&self, path: &str) -> Result<Url, ApiError> {
    Ok(self.base_url.join(path)?)
  }

  /// Turn non-success responses into errors.
  ///
  /// A 401 drops the session token so later requests go out unauthenticated
  /// and the UI can prompt for a new one.
  async fn check_response(&self, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
      warn!("API rejected the session token, clearing it");
      self.clear_token();
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, &body))
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, ApiError> {
    let url = self.url(path)?;
    debug!(%url, "GET");

    let mut request = self
      .http
      .get(url)
      .query(query)
      .header(header::ACCEPT, "application/json");
    if let Some(token) = self.token() {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(ApiError::from_transport)?;
    let response = self.check_response(response).await?;

    response
      .json::<T>()
      .await
      .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
  }

  /// Overview data, fetched concurrently and merged.
  pub async fn dashboard_overview(&self) -> Result<DashboardPayload, ApiError> {
    let recent: Query = vec![("limit".to_string(), RECENT_LIMIT.to_string())];
    let no_query = Query::new();
    let (stats, payments, expenses) = futures::try_join!(
      self.get_json::<ApiStatsResponse>("stats/overview", &no_query),
      self.get_json::<ApiPaymentsPage>("payments", &recent),
      self.get_json::<ApiExpensesPage>("expenses", &recent),
    )?;

    Ok(DashboardPayload {
      stats,
      recent_payments: payments.payments,
      recent_expenses: expenses.expenses,
    })
  }

  pub async fn college_stats(&self, college: &str) -> Result<ApiStatsResponse, ApiError> {
    self
      .get_json(&format!("colleges/{}/stats", college), &Query::new())
      .await
  }

  pub async fn department_stats(&self, department: &str) -> Result<ApiStatsResponse, ApiError> {
    self
      .get_json(&format!("departments/{}/stats", department), &Query::new())
      .await
  }

  pub async fn payments(
    &self,
    scope: &CacheScope,
    params: &KeyParams,
  ) -> Result<ApiPaymentsPage, ApiError> {
    self.get_json("payments", &list_query(scope, params)).await
  }

  pub async fn expenses(
    &self,
    scope: &CacheScope,
    params: &KeyParams,
  ) -> Result<ApiExpensesPage, ApiError> {
    self.get_json("expenses", &list_query(scope, params)).await
  }

  pub async fn executives(&self, scope: &CacheScope) -> Result<ApiExecutivesResponse, ApiError> {
    self.get_json("executives", &scope_query(scope)).await
  }

  /// Record an expense.
  pub async fn create_expense(&self, expense: &NewExpense) -> Result<(), ApiError> {
    let url = self.url("expenses")?;
    debug!(%url, "POST");

    let mut request = self.http.post(url).json(expense);
    if let Some(token) = self.token() {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(ApiError::from_transport)?;
    self.check_response(response).await?;
    Ok(())
  }
}

fn scope_query(scope: &CacheScope) -> Query {
  let mut query = Query::new();
  if let Some(college) = &scope.college {
    query.push(("college".to_string(), college.clone()));
  }
  if let Some(department) = &scope.department {
    query.push(("department".to_string(), department.clone()));
  }
  query
}

fn list_query(scope: &CacheScope, params: &KeyParams) -> Query {
  let mut query = vec![
    ("page".to_string(), params.page.unwrap_or(1).to_string()),
    ("limit".to_string(), PAGE_SIZE.to_string()),
  ];
  query.extend(scope_query(scope));
  query.extend(
    params
      .filters
      .iter()
      .filter(|(_, v)| !v.trim().is_empty())
      .map(|(k, v)| (k.clone(), v.trim().to_string())),
  );
  query
}

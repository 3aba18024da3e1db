use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("Session expired, please sign in again")]
  Unauthorized,

  #[error("Access denied: {0}")]
  AccessDenied(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Request timed out")]
  Timeout,

  #[error("Server error: {0}")]
  ServerError(String),

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  #[error("Invalid request URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 300;

impl ApiError {
  /// Truncate a response body so errors stay readable in the status bar
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
      end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
  }

  pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
    let truncated = Self::truncate_body(body);
    match status.as_u16() {
      401 => ApiError::Unauthorized,
      403 => ApiError::AccessDenied(truncated),
      404 => ApiError::NotFound(truncated),
      500..=599 => ApiError::ServerError(truncated),
      _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
    }
  }

  /// Map a transport error, keeping timeouts distinguishable.
  pub fn from_transport(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Timeout
    } else {
      ApiError::Network(err)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::StatusCode;

  #[test]
  fn test_status_mapping() {
    assert!(matches!(
      ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
      ApiError::Unauthorized
    ));
    assert!(matches!(
      ApiError::from_status(StatusCode::NOT_FOUND, "missing"),
      ApiError::NotFound(body) if body == "missing"
    ));
    assert!(matches!(
      ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
      ApiError::ServerError(_)
    ));
    assert!(matches!(
      ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
      ApiError::InvalidResponse(_)
    ));
  }

  #[test]
  fn test_long_bodies_are_truncated() {
    let body = "é".repeat(400);
    match ApiError::from_status(StatusCode::FORBIDDEN, &body) {
      ApiError::AccessDenied(msg) => {
        assert!(msg.len() < body.len());
        assert!(msg.ends_with("(800 bytes)"));
      }
      other => panic!("unexpected {:?}", other),
    }
  }
}

//! Error types for the stats server

use axum::{
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};

/// Seconds a client should wait before retrying a retryable failure.
const RETRY_AFTER: &str = "5";

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("Identity not found")]
  IdentityNotFound,

  #[error("Upstream unavailable: {0}")]
  Upstream(String),

  #[error("Deadline exceeded")]
  Deadline,

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Errors of the "upstream unavailable" class. Ingestion is idempotent,
  /// so the whole call may be repeated.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Error::Database(_) | Error::Upstream(_) | Error::Deadline)
  }
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      Error::Upstream(format!("malformed catalog payload: {err}"))
    } else {
      Error::Upstream(err.to_string())
    }
  }
}

impl From<json::Error> for Error {
  fn from(err: json::Error) -> Self {
    Error::Internal(format!("serialization failed: {err}"))
  }
}

impl From<tokio::time::error::Elapsed> for Error {
  fn from(_: tokio::time::error::Elapsed) -> Self {
    Error::Deadline
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::IdentityNotFound => (StatusCode::NOT_FOUND, "Identity not found"),
      Error::Database(_) => (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable"),
      Error::Upstream(_) => {
        (StatusCode::SERVICE_UNAVAILABLE, "Catalog unavailable")
      }
      Error::Deadline => (StatusCode::SERVICE_UNAVAILABLE, "Deadline exceeded"),
      Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    };

    if status.is_server_error() {
      tracing::warn!("Request failed: {}", self);
    }

    let body = json::json!({
      "success": false,
      "error": message
    });

    let mut response = (status, axum::Json(body)).into_response();
    if self.is_retryable() {
      response
        .headers_mut()
        .insert(header::RETRY_AFTER, header::HeaderValue::from_static(RETRY_AFTER));
    }
    response
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retryable_class() {
    assert!(Error::Upstream("timeout".into()).is_retryable());
    assert!(Error::Deadline.is_retryable());
    assert!(Error::Database(sea_orm::DbErr::Custom("gone".into())).is_retryable());
    assert!(!Error::IdentityNotFound.is_retryable());
    assert!(!Error::Internal("bug".into()).is_retryable());
  }

  #[test]
  fn test_status_codes() {
    let status = |err: Error| err.into_response().status();

    assert_eq!(status(Error::IdentityNotFound), StatusCode::NOT_FOUND);
    assert_eq!(
      status(Error::Upstream("down".into())),
      StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
      status(Error::Internal("bug".into())),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn test_retry_after_only_when_retryable() {
    let response = Error::Deadline.into_response();
    assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER);

    let response = Error::IdentityNotFound.into_response();
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
  }
}

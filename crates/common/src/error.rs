use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The error taxonomy from the wire contract. Every service-level error
/// surfaces as exactly one of these variants; infrastructure failures
/// (database retry exhausted, blob store transient failure, coordination
/// store unreachable) are folded into `DependencyUnavailable` at the
/// service boundary rather than leaking their underlying cause to clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  InvalidState(String),
  #[error("{0}")]
  InvalidTransition(String),
  #[error("{0}")]
  LockedByOther(String),
  #[error("{0}")]
  NotLockOwner(String),
  #[error("{0}")]
  Validation(String),
  #[error("{0}")]
  Unauthenticated(String),
  #[error("{0}")]
  Unauthorized(String),
  #[error("{0}")]
  Conflict(String),
  #[error("{0}")]
  PartialWrite(String),
  #[error("{0}")]
  DependencyUnavailable(String),
  #[error("{0}")]
  Internal(String),
}

impl ApiError {
  pub fn type_tag(&self) -> &'static str {
    match self {
      ApiError::NotFound(_) => "NOT_FOUND",
      ApiError::InvalidState(_) => "INVALID_STATE",
      ApiError::InvalidTransition(_) => "INVALID_TRANSITION",
      ApiError::LockedByOther(_) => "LOCKED_BY_OTHER",
      ApiError::NotLockOwner(_) => "NOT_LOCK_OWNER",
      ApiError::Validation(_) => "VALIDATION",
      ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
      ApiError::Unauthorized(_) => "UNAUTHORIZED",
      ApiError::Conflict(_) => "CONFLICT",
      ApiError::PartialWrite(_) => "PARTIAL_WRITE",
      ApiError::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
      ApiError::Internal(_) => "INTERNAL",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::InvalidState(_)
      | ApiError::InvalidTransition(_)
      | ApiError::LockedByOther(_)
      | ApiError::NotLockOwner(_)
      | ApiError::Conflict(_)
      | ApiError::PartialWrite(_) => StatusCode::CONFLICT,
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
      ApiError::DependencyUnavailable(_) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    ApiError::NotFound(msg.into())
  }

  pub fn internal(msg: impl std::fmt::Display) -> Self {
    ApiError::Internal(msg.to_string())
  }

  pub fn dependency_unavailable(msg: impl std::fmt::Display) -> Self {
    ApiError::DependencyUnavailable(msg.to_string())
  }
}

#[derive(Serialize)]
struct ErrorBody {
  #[serde(rename = "type")]
  typ: &'static str,
  message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let body = ErrorEnvelope {
      error: ErrorBody {
        typ: self.type_tag(),
        message: self.to_string(),
      },
    };
    (status, Json(body)).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Wraps a successful response payload in the stable `{"data": ...}`
/// envelope required by the wire contract.
#[derive(Serialize)]
pub struct DataEnvelope<T: Serialize> {
  pub data: T,
}

impl<T: Serialize> DataEnvelope<T> {
  pub fn new(data: T) -> Self {
    DataEnvelope { data }
  }
}

impl<T: Serialize> IntoResponse for DataEnvelope<T> {
  fn into_response(self) -> Response {
    Json(self).into_response()
  }
}

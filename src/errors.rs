use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Application error type. Validation and not-found variants carry the wire
/// error code reported to the client alongside the message; everything else
/// collapses into a 500 whose body includes the underlying error text.
#[derive(Debug, Error)]
pub enum AppError {
  #[error("{message}")]
  Validation { code: &'static str, message: String },

  #[error("{message}")]
  NotFound { code: &'static str, message: String },

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
    AppError::Validation {
      code,
      message: message.into(),
    }
  }

  pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
    AppError::NotFound {
      code,
      message: message.into(),
    }
  }
}

// Lets handlers use `?` on functions returning anyhow::Result.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    if err.is::<sqlx::Error>() {
      return AppError::Sqlx(err.downcast::<sqlx::Error>().unwrap());
    }
    AppError::Internal(err.to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation { .. } => StatusCode::BAD_REQUEST,
      AppError::NotFound { .. } => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation { code, message } => {
        HttpResponse::BadRequest().json(json!({ "error": message, "code": code }))
      }
      AppError::NotFound { code, message } => HttpResponse::NotFound().json(json!({ "error": message, "code": code })),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({ "error": format!("Internal server error: {}", m) }))
      }
      AppError::Sqlx(e) => {
        HttpResponse::InternalServerError().json(json!({ "error": format!("Internal server error: {}", e) }))
      }
      AppError::Internal(m) => {
        HttpResponse::InternalServerError().json(json!({ "error": format!("Internal server error: {}", m) }))
      }
    }
  }
}

// Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;

  #[actix_web::test]
  async fn validation_errors_carry_code_and_400() {
    let err = AppError::validation("MISSING_NAME", "Name is required");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let resp = err.error_response();
    let body = to_bytes(resp.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "MISSING_NAME");
    assert_eq!(json["error"], "Name is required");
  }

  #[actix_web::test]
  async fn internal_errors_expose_underlying_message() {
    let err = AppError::Internal("No values to set".to_string());
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = err.error_response();
    let body = to_bytes(resp.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Internal server error: No values to set");
    assert!(json.get("code").is_none());
  }

  #[actix_web::test]
  async fn not_found_maps_to_404() {
    let err = AppError::not_found("CATEGORY_NOT_FOUND", "Category not found");
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
  }
}

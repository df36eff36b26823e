//! Unified API error handling.
//!
//! Every failure leaving the API is a structured JSON body with a `detail`
//! message (and optional per-field `errors`), paired with the right status
//! code. Database and other internal errors are logged server-side and
//! surfaced as opaque 500s.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Success envelope for endpoints that only confirm an action.
#[derive(Debug, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

impl MsgResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// The error body: a human-readable `detail`, plus field-level errors for
/// validation failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, Vec<String>>>,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            errors: None,
        }
    }

    /// Bad request (400): malformed or duplicate input, rejected before
    /// any mutation.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// Unauthorized (401): missing/invalid credentials or token.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    /// Not found (404)
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// Internal error (500) with a generic user-facing message.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    /// Validation failure (400) with field-level details.
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        let detail = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self {
            status: StatusCode::BAD_REQUEST,
            detail,
            errors: Some(errors),
        }
    }

    /// Single-field validation failure.
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status, self.detail)
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Database error");

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                ApiError::bad_request("A resource with this identifier already exists")
            }
            _ => ApiError::internal("Something went wrong. Try again later."),
        }
    }
}

impl From<crate::db::RoomCreateError> for ApiError {
    fn from(err: crate::db::RoomCreateError) -> Self {
        match err {
            crate::db::RoomCreateError::Database(e) => e.into(),
            crate::db::RoomCreateError::CodesExhausted => {
                tracing::error!("Room code generation exhausted all attempts");
                ApiError::internal("Something went wrong. Try again later.")
            }
        }
    }
}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return Ok(()) if no errors, or Err(ApiError) if there are errors
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_map_to_status_codes() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::internal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_single_field_uses_message_as_detail() {
        let err = ApiError::validation_field("username", "Username is too short");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Username is too short");
    }

    #[test]
    fn test_validation_multiple_fields_summarizes() {
        let mut errors = HashMap::new();
        errors.insert("username".to_string(), vec!["too short".to_string()]);
        errors.insert("email".to_string(), vec!["bad format".to_string()]);

        let err = ApiError::validation(errors);
        assert!(err.detail().contains("2 fields"));
    }

    #[test]
    fn test_builder_accumulates_per_field() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("username", "too short");
        builder.add("username", "bad characters");
        builder.add("email", "bad format");
        assert!(!builder.is_empty());

        let err = builder.finish().unwrap_err();
        let errors = err.errors.as_ref().unwrap();
        assert_eq!(errors.get("username").unwrap().len(), 2);
        assert_eq!(errors.get("email").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_builder_finishes_ok() {
        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_sqlx_error_mapping() {
        // RowNotFound is the only sqlx variant constructible without a live
        // database; it must map to 404, everything unexpected to 500.
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = sqlx::Error::PoolClosed.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

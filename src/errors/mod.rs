//! Error handling module for the conference catalog backend.
//!
//! Every store operation returns [`AppError`]; handlers render it as the
//! `{"Message": ..., "Cause": ...}` envelope with the matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Envelope messages, one per error class.
pub mod messages {
    pub const NOT_FOUND: &str = "Entity not found";
    pub const DESERIALIZE: &str = "Error deserializing entity";
    pub const VALIDATION: &str = "Error validating entity";
    pub const INVALID_REQUEST: &str = "Invalid request";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "Unsupported media type";
    pub const UNEXPECTED: &str = "Unexpected error occurred";
    pub const NOT_IMPLEMENTED: &str = "Not implemented";
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The addressed row does not exist
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: u32 },
    /// A required field is missing or a constraint was violated
    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },
    /// The request body could not be decoded
    #[error("{0}")]
    Deserialize(String),
    /// Malformed path parameter or header
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    /// Database or serialization failure
    #[error("{0}")]
    Infrastructure(String),
    #[error("{0}")]
    NotImplemented(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Deserialize(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Human summary placed in the envelope's `Message` field.
    pub fn message(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => messages::NOT_FOUND,
            AppError::Validation { .. } => messages::VALIDATION,
            AppError::Deserialize(_) => messages::DESERIALIZE,
            AppError::BadRequest(_) => messages::INVALID_REQUEST,
            AppError::UnsupportedMediaType(_) => messages::UNSUPPORTED_MEDIA_TYPE,
            AppError::Infrastructure(_) => messages::UNEXPECTED,
            AppError::NotImplemented(_) => messages::NOT_IMPLEMENTED,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::validation("name", format!("must be unique ({db_err})"));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::validation("reference", format!("constraint failed ({db_err})"));
            }
        }
        tracing::error!("Database error: {:?}", err);
        AppError::Infrastructure(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Deserialize(err.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        tracing::error!("Stored timestamp is not RFC 3339: {:?}", err);
        AppError::Infrastructure(format!("Corrupt timestamp: {}", err))
    }
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Cause")]
    pub cause: String,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            message: error.message().to_string(),
            cause: error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = AppError::NotFound {
            entity: "Organization",
            id: 999,
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message(), "Entity not found");
        assert_eq!(not_found.to_string(), "Organization with id 999 not found");

        let validation = AppError::validation("name", "is required");
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.to_string(), "name: is required");

        assert_eq!(
            AppError::Infrastructure("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::UnsupportedMediaType("text/plain".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn test_envelope_field_names() {
        let body = serde_json::to_value(ErrorResponse::new(&AppError::NotFound {
            entity: "Location",
            id: 7,
        }))
        .unwrap();
        assert_eq!(body["Message"], "Entity not found");
        assert_eq!(body["Cause"], "Location with id 7 not found");
    }

    #[test]
    fn test_row_not_found_is_infrastructure() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Infrastructure(_)));
    }
}

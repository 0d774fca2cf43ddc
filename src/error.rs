// Error handling module for the Bookshop API
// Provides centralized error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Main error type for the API
/// Handlers outside the domain modules return Result<T, ApiError>
///
/// Each variant maps to a specific HTTP status code and error response format.
#[derive(Debug)]
pub enum ApiError {
    /// Validation errors from request validation
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Duplicate resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict { message: String },

    /// Database operation errors
    /// Maps to HTTP 500 Internal Server Error
    /// Sensitive details are filtered from client responses
    DatabaseError(sqlx::Error),

    /// Internal server errors
    /// Maps to HTTP 500 Internal Server Error
    InternalError(String),

    /// Authentication failures
    /// Maps to HTTP 401 Unauthorized
    Unauthorized(String),

    /// Authorization failures
    /// Maps to HTTP 403 Forbidden
    Forbidden(String),

    /// Malformed query parameters
    /// Maps to HTTP 400 Bad Request
    BadRequest(String),
}

/// Consistent error response structure
///
/// Defines the JSON format for all error responses: a machine-readable
/// error_code, a human-readable message, and optional field-level details.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logging levels follow error severity:
    /// - error!: internal and database errors (500-level)
    /// - warn!: client errors that might indicate issues (conflict, auth)
    /// - debug!: expected client errors (validation, not found)
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);

                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "VALIDATION_ERROR".to_string(),
                        message: "Request validation failed".to_string(),
                        details: Some(
                            serde_json::to_value(errors).unwrap_or(serde_json::json!({})),
                        ),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);

                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error_code: "NOT_FOUND".to_string(),
                        message: format!("{} with id {} not found", resource, id),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);

                (
                    StatusCode::CONFLICT,
                    ErrorResponse {
                        error_code: "CONFLICT".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::DatabaseError(db_error) => {
                // Log the full database error internally, return a generic
                // message to the client (no sensitive data exposure)
                error!("Database error: {:?}", db_error);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "DATABASE_ERROR".to_string(),
                        message: "A database error occurred".to_string(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred".to_string(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::Unauthorized(message) => {
                warn!("Unauthorized access attempt: {}", message);

                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse {
                        error_code: "UNAUTHORIZED".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden access attempt: {}", message);

                (
                    StatusCode::FORBIDDEN,
                    ErrorResponse {
                        error_code: "FORBIDDEN".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::BadRequest(message) => {
                debug!("Bad request: {}", message);

                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "BAD_REQUEST".to_string(),
                        message: message.clone(),
                        details: None,
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error)
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

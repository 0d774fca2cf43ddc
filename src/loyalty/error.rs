use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for loyalty operations
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Loyalty card not found")]
    NotFound,

    #[error("Insufficient bonus balance")]
    InsufficientBalance,

    #[error("Concurrent loyalty update conflict")]
    Conflict,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<sqlx::Error> for LoyaltyError {
    fn from(err: sqlx::Error) -> Self {
        // Serialization failures and deadlocks are retryable conflicts
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return LoyaltyError::Conflict;
                }
            }
        }
        LoyaltyError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for LoyaltyError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            LoyaltyError::DatabaseError(msg) => {
                tracing::error!("Loyalty database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            LoyaltyError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            LoyaltyError::InsufficientBalance => (StatusCode::BAD_REQUEST, self.to_string()),
            LoyaltyError::Conflict => (StatusCode::CONFLICT, self.to_string()),
            LoyaltyError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

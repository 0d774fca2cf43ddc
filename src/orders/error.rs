use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::cart::error::CartError;
use crate::loyalty::error::LoyaltyError;

/// Error types for order settlement and management
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Validation failed on '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("Order not found")]
    NotFound,

    #[error("{resource} with id {id} not found")]
    ReferenceNotFound { resource: &'static str, id: i32 },

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Concurrent checkout conflict")]
    Conflict,
}

impl OrderError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        OrderError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return OrderError::Conflict;
                }
            }
        }
        OrderError::DatabaseError(err.to_string())
    }
}

impl From<LoyaltyError> for OrderError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::Conflict => OrderError::Conflict,
            LoyaltyError::InsufficientBalance => {
                // Settlement caps redemption instead of failing; reaching
                // this is a programming error upstream
                OrderError::DatabaseError("loyalty debit exceeded balance".to_string())
            }
            other => OrderError::DatabaseError(other.to_string()),
        }
    }
}

impl From<CartError> for OrderError {
    fn from(err: CartError) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            OrderError::DatabaseError(msg) => {
                tracing::error!("Order database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error" }),
                )
            }
            OrderError::EmptyCart => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Cart is empty. Add items before checking out." }),
            ),
            OrderError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "field": field }),
            ),
            OrderError::NotFound => {
                (StatusCode::NOT_FOUND, json!({ "error": "Order not found" }))
            }
            OrderError::ReferenceNotFound { .. } => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            OrderError::InvalidTransition(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            OrderError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            OrderError::Conflict => (
                StatusCode::CONFLICT,
                json!({ "error": "Checkout conflicted with a concurrent request, please retry" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

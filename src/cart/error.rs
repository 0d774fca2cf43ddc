use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ProductType;

/// Error types for cart operations
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Product {product_type} with id {product_id} not found")]
    ProductNotFound {
        product_type: ProductType,
        product_id: i32,
    },

    #[error("Unknown product type: {0}")]
    UnknownProductType(String),

    #[error("Invalid cart key: {0}")]
    InvalidKey(String),

    #[error("Session store error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<redis::RedisError> for CartError {
    fn from(err: redis::RedisError) -> Self {
        CartError::Storage(err.to_string())
    }
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        CartError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CartError::ProductNotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            CartError::UnknownProductType(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CartError::InvalidKey(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CartError::Storage(msg) => {
                tracing::error!("Cart session store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session store error".to_string(),
                )
            }
            CartError::DatabaseError(msg) => {
                tracing::error!("Cart database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// HTTP handlers for cart endpoints
//
// Responses always echo the session id so clients created mid-request
// can persist their cart token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::cart::error::CartError;
use crate::cart::models::CartSummary;
use crate::cart::store::CartSession;
use crate::models::ProductType;

/// Request body for adding a product to the cart
#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_type: ProductType,
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}

/// Request body for overwriting a line quantity
#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

/// Cart response: summary plus the session token
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub summary: CartSummary,
}

/// Handler for GET /api/cart
pub async fn get_cart_handler(
    State(state): State<crate::AppState>,
    CartSession(session_id): CartSession,
) -> Result<Json<CartResponse>, CartError> {
    let summary = state.cart.summarize(session_id).await?;
    Ok(Json(CartResponse {
        session_id,
        summary,
    }))
}

/// Handler for POST /api/cart/items
pub async fn add_cart_item_handler(
    State(state): State<crate::AppState>,
    CartSession(session_id): CartSession,
    Json(request): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), CartError> {
    request
        .validate()
        .map_err(|e| CartError::InvalidKey(e.to_string()))?;

    let summary = state
        .cart
        .add_item(
            session_id,
            request.product_type,
            request.product_id,
            request.quantity,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CartResponse {
            session_id,
            summary,
        }),
    ))
}

/// Handler for PATCH /api/cart/items/{key}
pub async fn update_cart_item_handler(
    State(state): State<crate::AppState>,
    CartSession(session_id): CartSession,
    Path(key): Path<String>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<CartResponse>, CartError> {
    let summary = state
        .cart
        .update_quantity(session_id, &key, request.quantity)
        .await?;

    Ok(Json(CartResponse {
        session_id,
        summary,
    }))
}

/// Handler for DELETE /api/cart/items/{key}
pub async fn remove_cart_item_handler(
    State(state): State<crate::AppState>,
    CartSession(session_id): CartSession,
    Path(key): Path<String>,
) -> Result<Json<CartResponse>, CartError> {
    let summary = state.cart.remove_item(session_id, &key).await?;
    Ok(Json(CartResponse {
        session_id,
        summary,
    }))
}

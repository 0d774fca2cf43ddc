// HTTP handlers for checkout and order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::audit::models::RequestMeta;
use crate::auth::middleware::{AuthenticatedUser, OptionalUser};
use crate::cart::store::CartSession;
use crate::orders::error::OrderError;
use crate::orders::models::{
    CheckoutRequest, CheckoutResponse, DeliveryOption, OrderResponse, OrderStatus, PickupPoint,
    UpdateStatusRequest,
};

/// Query parameters for the back-office order list
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

/// Handler for POST /api/checkout
/// Settles the session cart into an order; guests are welcome
pub async fn checkout_handler(
    State(state): State<crate::AppState>,
    OptionalUser(user): OptionalUser,
    CartSession(session_id): CartSession,
    meta: RequestMeta,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), OrderError> {
    let response = state
        .orders
        .checkout(user.map(|u| u.user_id), session_id, request, &meta)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/orders
/// Order history for the authenticated customer
pub async fn get_order_history_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<OrderResponse>>, OrderError> {
    let orders = state.orders.get_user_orders(user.user_id).await?;
    Ok(Json(orders))
}

/// Handler for GET /api/orders/{order_id}
pub async fn get_order_by_id_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state.orders.get_order(order_id, &user).await?;
    Ok(Json(order))
}

/// Handler for GET /api/manager/orders
/// Full order list with optional status filter (staff only)
pub async fn list_orders_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, OrderError> {
    let orders = state.orders.list_orders(&user, query.status).await?;
    Ok(Json(orders))
}

/// Handler for PATCH /api/manager/orders/{order_id}/status
/// Manager-initiated status transition
pub async fn update_order_status_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::validation("status", e.to_string()))?;

    let order = state
        .orders
        .update_status(order_id, request.status, &user, &meta)
        .await?;

    Ok(Json(order))
}

/// Handler for GET /api/delivery-options
/// Active delivery options for the checkout form
pub async fn list_delivery_options_handler(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<DeliveryOption>>, OrderError> {
    let options = state.delivery_options.list_active().await?;
    Ok(Json(options))
}

/// Handler for GET /api/pickup-points
/// Active pickup points for the checkout form
pub async fn list_pickup_points_handler(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<PickupPoint>>, OrderError> {
    let points = state.pickup_points.list_active().await?;
    Ok(Json(points))
}

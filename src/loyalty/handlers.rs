// HTTP handlers for the loyalty card surface

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::audit::models::RequestMeta;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::models::Role;
use crate::loyalty::error::LoyaltyError;
use crate::loyalty::models::{LoyaltyCard, LoyaltyCardResponse};

/// Handler for GET /api/loyalty/card
///
/// The owner's card view; runs the birthday check the way the storefront
/// does on profile views. 404 when the user has no card yet.
pub async fn get_loyalty_card_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<LoyaltyCardResponse>, LoyaltyError> {
    let birth_date = state
        .users
        .find_by_id(user.user_id)
        .await
        .map_err(|e| LoyaltyError::DatabaseError(e.to_string()))?
        .and_then(|u| u.birth_date);

    let today = Utc::now().date_naive();
    let viewed = state
        .loyalty
        .view_card(user.user_id, birth_date, today)
        .await?
        .ok_or(LoyaltyError::NotFound)?;

    let (card, granted) = viewed;
    Ok(Json(LoyaltyCardResponse::from_card(&card, granted)))
}

/// Handler for POST /api/admin/loyalty/{user_id}/repair
///
/// Explicit one-time backfill of total_spent from completed orders;
/// administrators only.
pub async fn repair_loyalty_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Path(user_id): Path<i32>,
) -> Result<Json<LoyaltyCard>, LoyaltyError> {
    user.ensure_role(Role::Admin)
        .map_err(|e| LoyaltyError::Forbidden(e.to_string()))?;

    let card = state.loyalty.repair_totals(user_id, &meta).await?;
    Ok(Json(card))
}

// Wishlist: per-user favorites with a single toggle operation

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::audit::models::{AuditAction, NewAuditEntry, RequestMeta};
use crate::audit::recorder::AuditSink;
use crate::auth::middleware::AuthenticatedUser;
use crate::cart::error::CartError;
use crate::error::ApiError;
use crate::models::ProductType;

/// A wishlist entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WishlistItem {
    pub id: i32,
    pub user_id: i32,
    pub product_type: ProductType,
    pub product_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Request body for toggling a product in the wishlist
#[derive(Debug, Deserialize)]
pub struct ToggleWishlistRequest {
    pub product_type: ProductType,
    pub product_id: i32,
}

/// Toggle outcome
#[derive(Debug, Serialize)]
pub struct ToggleWishlistResponse {
    pub in_wishlist: bool,
    pub wishlist_count: i64,
}

/// Repository for wishlist operations
#[derive(Clone)]
pub struct WishlistRepository {
    pool: PgPool,
}

impl WishlistRepository {
    /// Create a new WishlistRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Toggle a product: insert when absent, delete when present.
    /// Returns true when the product is in the wishlist afterwards.
    pub async fn toggle(
        &self,
        user_id: i32,
        product_type: ProductType,
        product_id: i32,
    ) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO wishlist_items (user_id, product_type, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_type, product_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(product_type)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            return Ok(true);
        }

        sqlx::query(
            "DELETE FROM wishlist_items WHERE user_id = $1 AND product_type = $2 AND product_id = $3",
        )
        .bind(user_id)
        .bind(product_type)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(false)
    }

    /// All wishlist entries for a user, newest first
    pub async fn list(&self, user_id: i32) -> Result<Vec<WishlistItem>, sqlx::Error> {
        sqlx::query_as::<_, WishlistItem>(
            "SELECT id, user_id, product_type, product_id, created_at \
             FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Number of wishlist entries for a user
    pub async fn count(&self, user_id: i32) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Handler for POST /api/wishlist/toggle
pub async fn toggle_wishlist_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    meta: RequestMeta,
    Json(request): Json<ToggleWishlistRequest>,
) -> Result<Json<ToggleWishlistResponse>, ApiError> {
    // The product must exist before it can be wished for
    let snapshot = state
        .products
        .find_snapshot(request.product_type, request.product_id)
        .await
        .map_err(|e| match e {
            CartError::ProductNotFound { .. } => ApiError::NotFound {
                resource: request.product_type.to_string(),
                id: request.product_id.to_string(),
            },
            other => ApiError::InternalError(other.to_string()),
        })?;

    let in_wishlist = state
        .wishlist
        .toggle(user.user_id, request.product_type, request.product_id)
        .await?;

    let action = if in_wishlist {
        AuditAction::Create
    } else {
        AuditAction::Delete
    };
    let verb = if in_wishlist { "added to" } else { "removed from" };
    state
        .audit
        .record(
            NewAuditEntry::new(action)
                .actor(Some(user.user_id))
                .subject("Wishlist", request.product_id, &snapshot.name)
                .describe(format!("\"{}\" {} wishlist", snapshot.name, verb))
                .with_meta(&meta),
        )
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let wishlist_count = state.wishlist.count(user.user_id).await?;

    Ok(Json(ToggleWishlistResponse {
        in_wishlist,
        wishlist_count,
    }))
}

/// Handler for GET /api/wishlist
pub async fn get_wishlist_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<WishlistItem>>, ApiError> {
    let items = state.wishlist.list(user.user_id).await?;
    Ok(Json(items))
}

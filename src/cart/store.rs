// Redis-backed session storage for carts
//
// The typed Cart is serialized to JSON only here, at the store boundary.
// Keys expire with the browsing session; checkout clears them explicitly.

use axum::{extract::FromRequestParts, http::request::Parts};
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::cart::error::CartError;
use crate::cart::models::Cart;

/// Carts live for a week of inactivity
const CART_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Header carrying the client's cart session token
pub const CART_SESSION_HEADER: &str = "x-cart-session";

/// Redis-backed cart store
#[derive(Clone)]
pub struct CartStore {
    conn: ConnectionManager,
}

impl CartStore {
    /// Connect to Redis and build the store
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        tracing::debug!("Connecting cart store to Redis");
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Cart session store connected");
        Ok(Self { conn })
    }

    fn key(session_id: Uuid) -> String {
        format!("cart:{}", session_id)
    }

    /// Load the cart for a session; missing or unreadable state yields an
    /// empty cart
    pub async fn load(&self, session_id: Uuid) -> Result<Cart, CartError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(session_id)).await?;

        let cart = match raw {
            Some(payload) => serde_json::from_str(&payload).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable cart for session {}: {}", session_id, e);
                Cart::default()
            }),
            None => Cart::default(),
        };

        Ok(cart)
    }

    /// Persist the cart, refreshing its TTL
    pub async fn save(&self, session_id: Uuid, cart: &Cart) -> Result<(), CartError> {
        let payload = serde_json::to_string(cart)
            .map_err(|e| CartError::Storage(format!("cart serialization failed: {}", e)))?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(session_id), payload, CART_TTL_SECS)
            .await?;

        Ok(())
    }

    /// Drop the cart for a session (successful checkout)
    pub async fn clear(&self, session_id: Uuid) -> Result<(), CartError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::key(session_id)).await?;
        Ok(())
    }
}

/// Cart session token extractor
///
/// Reads the session UUID from the `x-cart-session` header; a missing or
/// malformed header starts a fresh session. Responses echo the id so the
/// client can persist it.
#[derive(Debug, Clone, Copy)]
pub struct CartSession(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get(CART_SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(CartSession(session_id))
    }
}

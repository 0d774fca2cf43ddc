// Cart service: orchestrates product lookup, cart mutation, and session
// persistence. Every mutation writes the cart back so it survives the
// request, mirroring session-modified semantics.

use uuid::Uuid;

use crate::cart::error::CartError;
use crate::cart::models::{CartKey, CartSummary};
use crate::cart::repository::ProductRepository;
use crate::cart::store::CartStore;
use crate::models::ProductType;

/// Service for cart aggregation
#[derive(Clone)]
pub struct CartService {
    store: CartStore,
    products: ProductRepository,
}

impl CartService {
    /// Create a new CartService
    pub fn new(store: CartStore, products: ProductRepository) -> Self {
        Self { store, products }
    }

    /// Add a product to the session cart
    ///
    /// Fails with ProductNotFound if the reference cannot be resolved.
    /// Quantity is clamped to at least 1.
    pub async fn add_item(
        &self,
        session_id: Uuid,
        product_type: ProductType,
        product_id: i32,
        quantity: u32,
    ) -> Result<CartSummary, CartError> {
        let snapshot = self.products.find_snapshot(product_type, product_id).await?;

        let mut cart = self.store.load(session_id).await?;
        cart.add(&snapshot, quantity.max(1));
        self.store.save(session_id, &cart).await?;

        tracing::debug!(
            "Added {}x {}:{} to cart session {}",
            quantity.max(1),
            product_type,
            product_id,
            session_id
        );
        Ok(cart.summarize())
    }

    /// Remove a line from the cart; unknown keys are a no-op
    pub async fn remove_item(&self, session_id: Uuid, key: &str) -> Result<CartSummary, CartError> {
        let mut cart = self.store.load(session_id).await?;
        if let Some(parsed) = CartKey::parse(key) {
            cart.remove(&parsed);
            self.store.save(session_id, &cart).await?;
        }
        Ok(cart.summarize())
    }

    /// Overwrite a line's quantity; zero or below removes the line
    pub async fn update_quantity(
        &self,
        session_id: Uuid,
        key: &str,
        quantity: i64,
    ) -> Result<CartSummary, CartError> {
        let parsed = CartKey::parse(key).ok_or_else(|| CartError::InvalidKey(key.to_string()))?;

        let mut cart = self.store.load(session_id).await?;
        cart.set_quantity(&parsed, quantity);
        self.store.save(session_id, &cart).await?;

        Ok(cart.summarize())
    }

    /// Current cart contents and totals
    pub async fn summarize(&self, session_id: Uuid) -> Result<CartSummary, CartError> {
        Ok(self.store.load(session_id).await?.summarize())
    }

    /// Clear the cart after a successful checkout
    pub async fn clear(&self, session_id: Uuid) -> Result<(), CartError> {
        self.store.clear(session_id).await
    }
}

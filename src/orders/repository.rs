use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::orders::error::OrderError;
use crate::orders::models::{
    DeliveryOption, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PaymentCard,
    PickupPoint, SavedAddress,
};

const ORDER_COLUMNS: &str = "id, user_id, full_name, email, phone, fulfillment_type, \
                             delivery_option_id, delivery_address, pickup_point_id, comment, \
                             total_amount, status, created_at, updated_at";

/// Repository for order operations
#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

impl OrdersRepository {
    /// Create a new OrdersRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its item snapshots inside the settlement
    /// transaction. Nothing is committed here; the caller owns the
    /// transaction boundary.
    pub async fn create_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders
                (user_id, full_name, email, phone, fulfillment_type, delivery_option_id,
                 delivery_address, pickup_point_id, comment, total_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(new_order.user_id)
        .bind(&new_order.full_name)
        .bind(&new_order.email)
        .bind(&new_order.phone)
        .bind(new_order.fulfillment_type)
        .bind(new_order.delivery_option_id)
        .bind(&new_order.delivery_address)
        .bind(new_order.pickup_point_id)
        .bind(&new_order.comment)
        .bind(new_order.total_amount)
        .fetch_one(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (order_id, product_type, product_id, name, unit_price, quantity, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id)
            .bind(item.product_type)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.subtotal)
            .execute(&mut **tx)
            .await?;
        }

        Ok(order)
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Find a user's orders, newest first
    pub async fn find_by_user(&self, user_id: i32) -> Result<Vec<Order>, OrderError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// List all orders with an optional status filter (back office)
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let orders = match status {
            Some(status_filter) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders WHERE status = $1 ORDER BY created_at DESC",
                    ORDER_COLUMNS
                ))
                .bind(status_filter)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {} FROM orders ORDER BY created_at DESC",
                    ORDER_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    /// Update order status
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(new_status)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderError::NotFound)?;

        Ok(order)
    }
}

/// Repository for order items operations
#[derive(Clone)]
pub struct OrderItemsRepository {
    pool: PgPool,
}

impl OrderItemsRepository {
    /// Create a new OrderItemsRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find all items for a given order
    pub async fn find_by_order_id(&self, order_id: Uuid) -> Result<Vec<OrderItem>, OrderError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_type, product_id, name, unit_price, quantity, subtotal
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// Repository for delivery options (active options only at the checkout
/// boundary)
#[derive(Clone)]
pub struct DeliveryOptionsRepository {
    pool: PgPool,
}

impl DeliveryOptionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active delivery option by ID
    pub async fn find_active(&self, id: i32) -> Result<Option<DeliveryOption>, OrderError> {
        let option = sqlx::query_as::<_, DeliveryOption>(
            "SELECT id, name, min_days, max_days, price, is_active \
             FROM delivery_options WHERE id = $1 AND is_active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(option)
    }

    /// List active delivery options, fastest first
    pub async fn list_active(&self) -> Result<Vec<DeliveryOption>, OrderError> {
        let options = sqlx::query_as::<_, DeliveryOption>(
            "SELECT id, name, min_days, max_days, price, is_active \
             FROM delivery_options WHERE is_active ORDER BY min_days, max_days",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(options)
    }
}

/// Repository for pickup points
#[derive(Clone)]
pub struct PickupPointsRepository {
    pool: PgPool,
}

impl PickupPointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active pickup point by ID
    pub async fn find_active(&self, id: i32) -> Result<Option<PickupPoint>, OrderError> {
        let point = sqlx::query_as::<_, PickupPoint>(
            "SELECT id, name, city, address, working_hours, is_active \
             FROM pickup_points WHERE id = $1 AND is_active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(point)
    }

    /// List active pickup points grouped by city
    pub async fn list_active(&self) -> Result<Vec<PickupPoint>, OrderError> {
        let points = sqlx::query_as::<_, PickupPoint>(
            "SELECT id, name, city, address, working_hours, is_active \
             FROM pickup_points WHERE is_active ORDER BY city, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }
}

/// Repository for saved addresses, always scoped to the owning user
#[derive(Clone)]
pub struct SavedAddressesRepository {
    pool: PgPool,
}

impl SavedAddressesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a saved address belonging to the given user
    pub async fn find_for_user(
        &self,
        id: i32,
        user_id: i32,
    ) -> Result<Option<SavedAddress>, OrderError> {
        let address = sqlx::query_as::<_, SavedAddress>(
            "SELECT id, user_id, title, city, address, postal_code, is_default, created_at \
             FROM saved_addresses WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }
}

/// Repository for stored payment cards, always scoped to the owning user
#[derive(Clone)]
pub struct PaymentCardsRepository {
    pool: PgPool,
}

impl PaymentCardsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a stored card belonging to the given user
    pub async fn find_for_user(
        &self,
        id: i32,
        user_id: i32,
    ) -> Result<Option<PaymentCard>, OrderError> {
        let card = sqlx::query_as::<_, PaymentCard>(
            "SELECT id, user_id, card_number_last4, cardholder_name, expiry_month, \
             expiry_year, is_default, created_at \
             FROM payment_cards WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Persist a masked card inside the settlement transaction: last-4
    /// and metadata only
    pub async fn create_masked_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        last4: &str,
        cardholder_name: &str,
        expiry_month: i32,
        expiry_year: i32,
    ) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            INSERT INTO payment_cards
                (user_id, card_number_last4, cardholder_name, expiry_month, expiry_year)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(last4)
        .bind(cardholder_name)
        .bind(expiry_month)
        .bind(expiry_year)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// Convenience alias for the delivery fee of an optional option
pub fn delivery_fee(option: Option<&DeliveryOption>) -> Decimal {
    option.map(|o| o.price).unwrap_or(Decimal::ZERO)
}

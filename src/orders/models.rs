use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::ProductType;

/// How the customer receives the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentType {
    Delivery,
    Pickup,
}

impl FulfillmentType {
    /// Convert fulfillment type to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::Delivery => "delivery",
            FulfillmentType::Pickup => "pickup",
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parse status from string
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "new" => Ok(OrderStatus::New),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }

    /// Completed and cancelled orders accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::New
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Domain model representing an order in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub fulfillment_type: FulfillmentType,
    pub delivery_option_id: Option<i32>,
    pub delivery_address: String,
    pub pickup_point_id: Option<i32>,
    pub comment: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain model representing an item within an order
///
/// Name, unit price, and subtotal are snapshots taken at settlement time
/// and are never recomputed from live catalog prices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: Uuid,
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Fields of an order about to be created by settlement
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<i32>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub fulfillment_type: FulfillmentType,
    pub delivery_option_id: Option<i32>,
    pub delivery_address: String,
    pub pickup_point_id: Option<i32>,
    pub comment: String,
    pub total_amount: Decimal,
}

/// An order line about to be created by settlement
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Delivery option reference data
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryOption {
    pub id: i32,
    pub name: String,
    pub min_days: i32,
    pub max_days: i32,
    pub price: Decimal,
    pub is_active: bool,
}

/// Pickup point reference data
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PickupPoint {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub address: String,
    pub working_hours: Option<String>,
    pub is_active: bool,
}

/// A customer's saved delivery address
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedAddress {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub city: String,
    pub address: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// A customer's stored payment card: last-4 and metadata only, never the
/// full number or CVV
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentCard {
    pub id: i32,
    pub user_id: i32,
    pub card_number_last4: String,
    pub cardholder_name: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for checkout
///
/// Cross-field rules (delivery vs pickup, saved vs new card) are enforced
/// by the settlement service before any state is touched.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 255, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(custom = "crate::validation::validate_phone")]
    pub phone: String,
    pub fulfillment_type: FulfillmentType,

    pub delivery_option_id: Option<i32>,
    pub saved_address_id: Option<i32>,
    pub delivery_city: Option<String>,
    pub delivery_street: Option<String>,
    pub delivery_building: Option<String>,
    pub delivery_apartment: Option<String>,
    pub delivery_postal_code: Option<String>,

    pub pickup_point_id: Option<i32>,

    pub payment_card_id: Option<i32>,
    pub new_card_number: Option<String>,
    pub new_cardholder_name: Option<String>,
    pub new_card_expiry_month: Option<i32>,
    pub new_card_expiry_year: Option<i32>,
    pub new_card_cvv: Option<String>,

    /// Bonus amount the customer asks to redeem; capped by the service
    #[serde(default)]
    pub use_bonuses: Option<Decimal>,

    pub comment: Option<String>,
}

/// Request DTO for updating order status (manager back office)
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Response DTO for order item
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: i32,
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            product_type: item.product_type,
            product_id: item.product_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}

/// Response DTO for order with items
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub status: OrderStatus,
    pub fulfillment_type: FulfillmentType,
    pub delivery_address: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response DTO for a successful checkout
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: OrderResponse,
    /// Amount of bonus actually redeemed; may be lower than requested
    pub bonus_redeemed: Decimal,
    /// Bonus accrued on the pre-redemption total
    pub bonus_earned: Decimal,
}

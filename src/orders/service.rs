// Order settlement and management
//
// Settlement converts a session cart plus checkout choices into a durable
// order in ONE database transaction: bonus redemption, order and item
// snapshots, masked-card persistence, and loyalty accrual commit together
// or not at all. The loyalty row is locked for the duration, so two
// concurrent checkouts by the same user cannot both over-redeem.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::audit::diff::diff_order_status;
use crate::audit::models::{AuditAction, NewAuditEntry, RequestMeta};
use crate::audit::recorder::AuditSink;
use crate::auth::middleware::AuthenticatedUser;
use crate::cart::service::CartService;
use crate::loyalty::service::LoyaltyService;
use crate::orders::error::OrderError;
use crate::orders::models::{
    CheckoutRequest, CheckoutResponse, DeliveryOption, FulfillmentType, NewOrder, NewOrderItem,
    Order, OrderItem, OrderResponse, OrderStatus,
};
use crate::orders::repository::{
    delivery_fee, DeliveryOptionsRepository, OrderItemsRepository, OrdersRepository,
    PaymentCardsRepository, PickupPointsRepository, SavedAddressesRepository,
};
use crate::orders::status_machine::StatusMachine;
use crate::validation::{
    strip_card_separators, validate_card_number, validate_expiry_month, validate_expiry_year,
};

/// Service for order settlement and back-office management
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    orders_repo: OrdersRepository,
    items_repo: OrderItemsRepository,
    delivery_repo: DeliveryOptionsRepository,
    pickup_repo: PickupPointsRepository,
    addresses_repo: SavedAddressesRepository,
    cards_repo: PaymentCardsRepository,
    loyalty: LoyaltyService,
    cart: CartService,
    audit: Arc<dyn AuditSink>,
}

impl OrderService {
    /// Create a new OrderService
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        orders_repo: OrdersRepository,
        items_repo: OrderItemsRepository,
        delivery_repo: DeliveryOptionsRepository,
        pickup_repo: PickupPointsRepository,
        addresses_repo: SavedAddressesRepository,
        cards_repo: PaymentCardsRepository,
        loyalty: LoyaltyService,
        cart: CartService,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            pool,
            orders_repo,
            items_repo,
            delivery_repo,
            pickup_repo,
            addresses_repo,
            cards_repo,
            loyalty,
            cart,
            audit,
        }
    }

    /// Settle the session cart into an order
    ///
    /// Validation happens before any state is touched; a validation
    /// failure leaves no partial order, no loyalty mutation, and an
    /// intact cart. A settlement that loses a concurrency race is
    /// retried once before the conflict is surfaced.
    pub async fn checkout(
        &self,
        user_id: Option<i32>,
        session_id: Uuid,
        request: CheckoutRequest,
        meta: &RequestMeta,
    ) -> Result<CheckoutResponse, OrderError> {
        let summary = self.cart.summarize(session_id).await?;
        if summary.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        validate_checkout(&request, user_id.is_some(), Utc::now().year())?;

        // Resolve fulfillment references up front; inactive or foreign
        // references abort before the transaction starts
        let (delivery_option, delivery_address, pickup_point_id) = match request.fulfillment_type {
            FulfillmentType::Delivery => {
                let option_id = request
                    .delivery_option_id
                    .ok_or_else(|| OrderError::validation("delivery_option_id", "Select a delivery option"))?;
                let option = self
                    .delivery_repo
                    .find_active(option_id)
                    .await?
                    .ok_or(OrderError::ReferenceNotFound {
                        resource: "DeliveryOption",
                        id: option_id,
                    })?;

                let address = match (user_id, request.saved_address_id) {
                    (Some(uid), Some(address_id)) => {
                        let saved = self
                            .addresses_repo
                            .find_for_user(address_id, uid)
                            .await?
                            .ok_or(OrderError::ReferenceNotFound {
                                resource: "SavedAddress",
                                id: address_id,
                            })?;
                        format!("{}, {}", saved.city, saved.address)
                    }
                    _ => format_manual_address(&request),
                };

                (Some(option), address, None)
            }
            FulfillmentType::Pickup => {
                let point_id = request
                    .pickup_point_id
                    .ok_or_else(|| OrderError::validation("pickup_point_id", "Select a pickup point"))?;
                let point = self
                    .pickup_repo
                    .find_active(point_id)
                    .await?
                    .ok_or(OrderError::ReferenceNotFound {
                        resource: "PickupPoint",
                        id: point_id,
                    })?;

                (None, String::new(), Some(point.id))
            }
        };

        if let (Some(uid), Some(card_id)) = (user_id, request.payment_card_id) {
            self.cards_repo
                .find_for_user(card_id, uid)
                .await?
                .ok_or(OrderError::ReferenceNotFound {
                    resource: "PaymentCard",
                    id: card_id,
                })?;
        }

        let items: Vec<NewOrderItem> = summary
            .items
            .iter()
            .map(|line| NewOrderItem {
                product_type: line.product_type,
                product_id: line.product_id,
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity as i32,
                subtotal: line.subtotal,
            })
            .collect();

        let mut attempt = 0;
        let (order, bonus_redeemed, bonus_earned) = loop {
            let result = self
                .settle(
                    user_id,
                    &request,
                    &items,
                    summary.total_amount,
                    delivery_option.as_ref(),
                    &delivery_address,
                    pickup_point_id,
                )
                .await;

            match result {
                Err(OrderError::Conflict) if attempt == 0 => {
                    tracing::warn!("Settlement lost a concurrency race, retrying once");
                    attempt += 1;
                }
                other => break other?,
            }
        };

        // The cart lives in the session store, outside the database
        // transaction; a failed clear must not undo a committed order
        if let Err(e) = self.cart.clear(session_id).await {
            tracing::warn!("Cart clear failed after checkout {}: {}", order.id, e);
        }

        self.audit
            .record(
                NewAuditEntry::new(AuditAction::Create)
                    .actor(user_id)
                    .subject("Order", order.id, format!("Order #{}", order.id))
                    .describe(format!(
                        "Order #{} created, total {} ({})",
                        order.id, order.total_amount, order.fulfillment_type
                    ))
                    .with_meta(meta),
            )
            .await
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?;

        tracing::info!(
            "Order {} settled: total {}, redeemed {}, earned {}",
            order.id,
            order.total_amount,
            bonus_redeemed,
            bonus_earned
        );

        let stored_items = self.items_repo.find_by_order_id(order.id).await?;
        Ok(CheckoutResponse {
            order: to_response(order, stored_items),
            bonus_redeemed,
            bonus_earned,
        })
    }

    /// One settlement attempt: everything inside a single transaction
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        user_id: Option<i32>,
        request: &CheckoutRequest,
        items: &[NewOrderItem],
        subtotal: Decimal,
        delivery_option: Option<&DeliveryOption>,
        delivery_address: &str,
        pickup_point_id: Option<i32>,
    ) -> Result<(Order, Decimal, Decimal), OrderError> {
        let mut tx = self.pool.begin().await?;

        let pre_bonus_total = subtotal + delivery_fee(delivery_option);

        // Redemption is capped inside the loyalty service at
        // min(requested, balance, pre-bonus total), under the row lock
        let requested = request.use_bonuses.unwrap_or(Decimal::ZERO);
        let bonus_redeemed = match user_id {
            Some(uid) if requested > Decimal::ZERO => {
                self.loyalty
                    .redeem_in_tx(&mut tx, uid, requested, pre_bonus_total)
                    .await?
            }
            _ => Decimal::ZERO,
        };

        let total_amount = post_bonus_total(pre_bonus_total, bonus_redeemed);

        let new_order = NewOrder {
            user_id,
            full_name: request.full_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            fulfillment_type: request.fulfillment_type,
            delivery_option_id: delivery_option.map(|o| o.id),
            delivery_address: delivery_address.to_string(),
            pickup_point_id,
            comment: request.comment.clone().unwrap_or_default(),
            total_amount,
        };

        let order = self.orders_repo.create_in_tx(&mut tx, &new_order, items).await?;

        // A newly entered card is stored masked; guests get nothing stored
        if let Some(uid) = user_id {
            if request.payment_card_id.is_none() {
                if let Some(number) = request.new_card_number.as_deref() {
                    let digits = strip_card_separators(number);
                    if digits.len() >= 4 {
                        self.cards_repo
                            .create_masked_in_tx(
                                &mut tx,
                                uid,
                                &digits[digits.len() - 4..],
                                request.new_cardholder_name.as_deref().unwrap_or(""),
                                request.new_card_expiry_month.unwrap_or(1),
                                request.new_card_expiry_year.unwrap_or(2024),
                            )
                            .await?;
                    }
                }
            }
        }

        // Accrual is computed on the PRE-redemption total, at the tier the
        // account held before this purchase; the card is created lazily on
        // a first purchase
        let bonus_earned = match user_id {
            Some(uid) => {
                self.loyalty
                    .accrue_purchase_in_tx(&mut tx, uid, pre_bonus_total)
                    .await?
                    .bonus
            }
            None => Decimal::ZERO,
        };

        tx.commit().await?;

        Ok((order, bonus_redeemed, bonus_earned))
    }

    /// Order history for a customer, newest first
    pub async fn get_user_orders(&self, user_id: i32) -> Result<Vec<OrderResponse>, OrderError> {
        let orders = self.orders_repo.find_by_user(user_id).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.items_repo.find_by_order_id(order.id).await?;
            responses.push(to_response(order, items));
        }

        Ok(responses)
    }

    /// A single order, visible to its owner and to staff
    pub async fn get_order(
        &self,
        order_id: Uuid,
        actor: &AuthenticatedUser,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.user_id != Some(actor.user_id) && !actor.role.is_staff() {
            return Err(OrderError::Forbidden(
                "You do not have permission to access this order".to_string(),
            ));
        }

        let items = self.items_repo.find_by_order_id(order.id).await?;
        Ok(to_response(order, items))
    }

    /// All orders with an optional status filter (staff)
    pub async fn list_orders(
        &self,
        actor: &AuthenticatedUser,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderResponse>, OrderError> {
        actor
            .ensure_staff()
            .map_err(|e| OrderError::Forbidden(e.to_string()))?;

        let orders = self.orders_repo.list(status).await?;
        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.items_repo.find_by_order_id(order.id).await?;
            responses.push(to_response(order, items));
        }

        Ok(responses)
    }

    /// Manager-initiated status transition, validated by the status
    /// machine and audited with the old→new diff
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: &AuthenticatedUser,
        meta: &RequestMeta,
    ) -> Result<OrderResponse, OrderError> {
        actor
            .ensure_staff()
            .map_err(|e| OrderError::Forbidden(e.to_string()))?;

        let order = self
            .orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        StatusMachine::transition(order.status, new_status)
            .map_err(OrderError::InvalidTransition)?;

        let updated = self.orders_repo.update_status(order_id, new_status).await?;

        let changes = diff_order_status(order.status, new_status);
        if !changes.is_empty() {
            self.audit
                .record(
                    NewAuditEntry::new(AuditAction::Update)
                        .actor(Some(actor.user_id))
                        .subject("Order", updated.id, format!("Order #{}", updated.id))
                        .describe(format!(
                            "Order #{} status changed from {} to {}",
                            updated.id, order.status, new_status
                        ))
                        .with_changes(changes)
                        .with_meta(meta),
                )
                .await
                .map_err(|e| OrderError::DatabaseError(e.to_string()))?;
        }

        let items = self.items_repo.find_by_order_id(updated.id).await?;
        Ok(to_response(updated, items))
    }
}

/// Post-redemption total, clamped at zero
fn post_bonus_total(pre_bonus_total: Decimal, redeemed: Decimal) -> Decimal {
    (pre_bonus_total - redeemed).max(Decimal::ZERO)
}

fn to_response(order: Order, items: Vec<OrderItem>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user_id: order.user_id,
        status: order.status,
        fulfillment_type: order.fulfillment_type,
        delivery_address: order.delivery_address,
        total_amount: order.total_amount,
        items: items.into_iter().map(|item| item.into()).collect(),
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |s| !s.trim().is_empty())
}

/// Assemble the delivery address from the manually entered fields
fn format_manual_address(request: &CheckoutRequest) -> String {
    let mut parts: Vec<String> = [
        &request.delivery_city,
        &request.delivery_street,
        &request.delivery_building,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref())
    .map(|part| part.trim().to_string())
    .filter(|part| !part.is_empty())
    .collect();

    if has_text(&request.delivery_apartment) {
        parts.push(format!(
            "apt. {}",
            request.delivery_apartment.as_deref().unwrap_or("").trim()
        ));
    }
    if has_text(&request.delivery_postal_code) {
        parts.push(format!(
            "postal code: {}",
            request.delivery_postal_code.as_deref().unwrap_or("").trim()
        ));
    }

    parts.join(", ")
}

/// Checkout preconditions: field-specific failures, checked before the
/// settlement transaction starts
fn validate_checkout(
    request: &CheckoutRequest,
    is_authenticated: bool,
    current_year: i32,
) -> Result<(), OrderError> {
    if let Err(errors) = request.validate() {
        if let Some((field, field_errors)) = errors.field_errors().into_iter().next() {
            let message = field_errors
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for '{}'", field));
            return Err(OrderError::validation(field, message));
        }
        return Err(OrderError::validation("request", "Invalid checkout request"));
    }

    if !is_authenticated {
        if request.saved_address_id.is_some() {
            return Err(OrderError::validation(
                "saved_address_id",
                "Sign in to use a saved address",
            ));
        }
        if request.payment_card_id.is_some() {
            return Err(OrderError::validation(
                "payment_card_id",
                "Sign in to use a saved card",
            ));
        }
    }

    match request.fulfillment_type {
        FulfillmentType::Delivery => {
            if request.saved_address_id.is_none() {
                if !has_text(&request.delivery_city) {
                    return Err(OrderError::validation("delivery_city", "Enter the delivery city"));
                }
                if !has_text(&request.delivery_street) {
                    return Err(OrderError::validation(
                        "delivery_street",
                        "Enter the delivery street",
                    ));
                }
                if !has_text(&request.delivery_building) {
                    return Err(OrderError::validation(
                        "delivery_building",
                        "Enter the building number",
                    ));
                }
            }
            if request.delivery_option_id.is_none() {
                return Err(OrderError::validation(
                    "delivery_option_id",
                    "Select a delivery option",
                ));
            }
        }
        FulfillmentType::Pickup => {
            if request.pickup_point_id.is_none() {
                return Err(OrderError::validation(
                    "pickup_point_id",
                    "Select a pickup point",
                ));
            }
        }
    }

    if request.payment_card_id.is_none() {
        let number = request
            .new_card_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                OrderError::validation(
                    "new_card_number",
                    "Enter a card number or choose a saved card",
                )
            })?;
        validate_card_number(number).map_err(|_| {
            OrderError::validation(
                "new_card_number",
                "Card number must contain at least 13 digits",
            )
        })?;

        if !has_text(&request.new_cardholder_name) {
            return Err(OrderError::validation(
                "new_cardholder_name",
                "Enter the cardholder name",
            ));
        }

        let month = request.new_card_expiry_month.ok_or_else(|| {
            OrderError::validation("new_card_expiry_month", "Enter the card expiry month")
        })?;
        validate_expiry_month(month).map_err(|_| {
            OrderError::validation("new_card_expiry_month", "Expiry month must be 1-12")
        })?;

        let year = request.new_card_expiry_year.ok_or_else(|| {
            OrderError::validation("new_card_expiry_year", "Enter the card expiry year")
        })?;
        validate_expiry_year(year, current_year)
            .map_err(|_| OrderError::validation("new_card_expiry_year", "The card has expired"))?;

        if !has_text(&request.new_card_cvv) {
            return Err(OrderError::validation("new_card_cvv", "Enter the CVV code"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const YEAR: i32 = 2026;

    fn pickup_request() -> CheckoutRequest {
        CheckoutRequest {
            full_name: "Anna Ivanova".to_string(),
            email: "anna@example.com".to_string(),
            phone: "+7 916 123-45-67".to_string(),
            fulfillment_type: FulfillmentType::Pickup,
            delivery_option_id: None,
            saved_address_id: None,
            delivery_city: None,
            delivery_street: None,
            delivery_building: None,
            delivery_apartment: None,
            delivery_postal_code: None,
            pickup_point_id: Some(1),
            payment_card_id: None,
            new_card_number: Some("1234 5678 9012 3456".to_string()),
            new_cardholder_name: Some("ANNA IVANOVA".to_string()),
            new_card_expiry_month: Some(12),
            new_card_expiry_year: Some(2030),
            new_card_cvv: Some("123".to_string()),
            use_bonuses: None,
            comment: None,
        }
    }

    fn delivery_request() -> CheckoutRequest {
        let mut request = pickup_request();
        request.fulfillment_type = FulfillmentType::Delivery;
        request.pickup_point_id = None;
        request.delivery_option_id = Some(2);
        request.delivery_city = Some("Moscow".to_string());
        request.delivery_street = Some("Arbat".to_string());
        request.delivery_building = Some("10".to_string());
        request
    }

    fn failed_field(result: Result<(), OrderError>) -> String {
        match result {
            Err(OrderError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_pickup_passes() {
        assert!(validate_checkout(&pickup_request(), true, YEAR).is_ok());
    }

    #[test]
    fn test_valid_delivery_passes() {
        assert!(validate_checkout(&delivery_request(), true, YEAR).is_ok());
    }

    #[test]
    fn test_guest_checkout_passes_with_new_card() {
        assert!(validate_checkout(&pickup_request(), false, YEAR).is_ok());
    }

    #[test]
    fn test_pickup_requires_point() {
        let mut request = pickup_request();
        request.pickup_point_id = None;
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "pickup_point_id"
        );
    }

    #[test]
    fn test_delivery_requires_option() {
        let mut request = delivery_request();
        request.delivery_option_id = None;
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "delivery_option_id"
        );
    }

    #[test]
    fn test_delivery_manual_address_requires_all_parts() {
        for (clear, expected) in [
            (0, "delivery_city"),
            (1, "delivery_street"),
            (2, "delivery_building"),
        ] {
            let mut request = delivery_request();
            match clear {
                0 => request.delivery_city = None,
                1 => request.delivery_street = Some("  ".to_string()),
                _ => request.delivery_building = None,
            }
            assert_eq!(failed_field(validate_checkout(&request, true, YEAR)), expected);
        }
    }

    #[test]
    fn test_saved_address_skips_manual_fields() {
        let mut request = delivery_request();
        request.saved_address_id = Some(5);
        request.delivery_city = None;
        request.delivery_street = None;
        request.delivery_building = None;
        assert!(validate_checkout(&request, true, YEAR).is_ok());
    }

    #[test]
    fn test_guest_cannot_reference_saved_entities() {
        let mut request = delivery_request();
        request.saved_address_id = Some(5);
        assert_eq!(
            failed_field(validate_checkout(&request, false, YEAR)),
            "saved_address_id"
        );

        let mut request = pickup_request();
        request.payment_card_id = Some(2);
        assert_eq!(
            failed_field(validate_checkout(&request, false, YEAR)),
            "payment_card_id"
        );
    }

    #[test]
    fn test_new_card_rules() {
        let mut request = pickup_request();
        request.new_card_number = None;
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_card_number"
        );

        let mut request = pickup_request();
        request.new_card_number = Some("1234 5678".to_string());
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_card_number"
        );

        let mut request = pickup_request();
        request.new_cardholder_name = None;
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_cardholder_name"
        );

        let mut request = pickup_request();
        request.new_card_expiry_month = Some(13);
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_card_expiry_month"
        );

        let mut request = pickup_request();
        request.new_card_expiry_year = Some(YEAR - 1);
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_card_expiry_year"
        );

        let mut request = pickup_request();
        request.new_card_cvv = Some(String::new());
        assert_eq!(
            failed_field(validate_checkout(&request, true, YEAR)),
            "new_card_cvv"
        );
    }

    #[test]
    fn test_saved_card_skips_new_card_fields() {
        let mut request = pickup_request();
        request.payment_card_id = Some(9);
        request.new_card_number = None;
        request.new_cardholder_name = None;
        request.new_card_expiry_month = None;
        request.new_card_expiry_year = None;
        request.new_card_cvv = None;
        assert!(validate_checkout(&request, true, YEAR).is_ok());
    }

    #[test]
    fn test_contact_field_validation_comes_first() {
        let mut request = pickup_request();
        request.email = "not-an-email".to_string();
        assert_eq!(failed_field(validate_checkout(&request, true, YEAR)), "email");

        let mut request = pickup_request();
        request.phone = "nope".to_string();
        assert_eq!(failed_field(validate_checkout(&request, true, YEAR)), "phone");
    }

    #[test]
    fn test_manual_address_formatting() {
        let mut request = delivery_request();
        request.delivery_apartment = Some("12".to_string());
        request.delivery_postal_code = Some("119002".to_string());

        assert_eq!(
            format_manual_address(&request),
            "Moscow, Arbat, 10, apt. 12, postal code: 119002"
        );

        request.delivery_apartment = None;
        request.delivery_postal_code = None;
        assert_eq!(format_manual_address(&request), "Moscow, Arbat, 10");
    }

    #[test]
    fn test_post_bonus_total_clamps_at_zero() {
        assert_eq!(post_bonus_total(dec!(1200), dec!(200)), dec!(1000));
        assert_eq!(post_bonus_total(dec!(1200), dec!(0)), dec!(1200));
        assert_eq!(post_bonus_total(dec!(100), dec!(500)), dec!(0));
    }

    #[test]
    fn test_guest_delivery_total_arithmetic() {
        // Cart subtotal 1000, delivery fee 200, no redemption => 1200
        let subtotal = dec!(1000);
        let fee = dec!(200);
        assert_eq!(post_bonus_total(subtotal + fee, Decimal::ZERO), dec!(1200));
    }
}

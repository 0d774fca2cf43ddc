use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{ProductSnapshot, ProductType};

/// Typed cart key: one line per (product type, product id) pair
///
/// The string form "book:12" is the map key in the session store and the
/// line identifier in the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CartKey {
    pub product_type: ProductType,
    pub product_id: i32,
}

impl CartKey {
    pub fn new(product_type: ProductType, product_id: i32) -> Self {
        Self {
            product_type,
            product_id,
        }
    }

    /// Parse a key from its "type:id" string form
    pub fn parse(raw: &str) -> Option<Self> {
        let (type_part, id_part) = raw.split_once(':')?;
        let product_type = ProductType::parse(type_part).ok()?;
        let product_id = id_part.parse().ok()?;
        Some(Self {
            product_type,
            product_id,
        })
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.product_type, self.product_id)
    }
}

/// One cart line holding a price/name/image snapshot taken when the
/// product was first added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Session-scoped cart: a mapping from string keys to typed lines
///
/// Serialized as JSON at the session-store boundary; all arithmetic is
/// exact decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: BTreeMap<String, CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a product to the cart
    ///
    /// The first add snapshots the product's price, name, and image;
    /// subsequent adds only increment the stored quantity.
    pub fn add(&mut self, snapshot: &ProductSnapshot, quantity: u32) {
        let key = CartKey::new(snapshot.product_type, snapshot.product_id).to_string();
        let line = self.lines.entry(key).or_insert_with(|| CartLine {
            product_type: snapshot.product_type,
            product_id: snapshot.product_id,
            name: snapshot.name.clone(),
            unit_price: snapshot.unit_price,
            image_url: snapshot.image_url.clone(),
            quantity: 0,
        });
        line.quantity += quantity;
    }

    /// Remove a line; absent keys are a no-op
    pub fn remove(&mut self, key: &CartKey) {
        self.lines.remove(&key.to_string());
    }

    /// Overwrite a line's quantity; zero or negative removes the line.
    /// Unknown keys are a no-op.
    pub fn set_quantity(&mut self, key: &CartKey, quantity: i64) {
        let key = key.to_string();
        if !self.lines.contains_key(&key) {
            return;
        }
        if quantity <= 0 {
            self.lines.remove(&key);
        } else if let Some(line) = self.lines.get_mut(&key) {
            line.quantity = quantity as u32;
        }
    }

    /// Derive the summary: per-line views plus exact-decimal totals
    pub fn summarize(&self) -> CartSummary {
        let mut items = Vec::with_capacity(self.lines.len());
        let mut total_amount = Decimal::ZERO;
        let mut total_quantity: u32 = 0;

        for (key, line) in &self.lines {
            let subtotal = line.subtotal();
            total_amount += subtotal;
            total_quantity += line.quantity;
            items.push(CartItemView {
                key: key.clone(),
                product_type: line.product_type,
                product_id: line.product_id,
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal,
                image_url: line.image_url.clone(),
            });
        }

        CartSummary {
            items,
            total_amount,
            total_quantity,
        }
    }
}

/// One line of the cart summary, with its derived subtotal
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub key: String,
    pub product_type: ProductType,
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
    pub image_url: Option<String>,
}

/// Cart contents with exact totals
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItemView>,
    pub total_amount: Decimal,
    pub total_quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book_snapshot(id: i32, price: Decimal) -> ProductSnapshot {
        ProductSnapshot {
            product_type: ProductType::Book,
            product_id: id,
            name: format!("Book {}", id),
            unit_price: price,
            image_url: None,
        }
    }

    fn pen_snapshot(price: Decimal) -> ProductSnapshot {
        ProductSnapshot {
            product_type: ProductType::Stationery,
            product_id: 1,
            name: "Pen".to_string(),
            unit_price: price,
            image_url: None,
        }
    }

    #[test]
    fn test_key_round_trip() {
        let key = CartKey::new(ProductType::Book, 12);
        assert_eq!(key.to_string(), "book:12");
        assert_eq!(CartKey::parse("book:12"), Some(key));
        assert_eq!(CartKey::parse("stationery:3").unwrap().product_id, 3);
    }

    #[test]
    fn test_key_parse_rejects_garbage() {
        assert!(CartKey::parse("book").is_none());
        assert!(CartKey::parse("magazine:1").is_none());
        assert!(CartKey::parse("book:twelve").is_none());
    }

    #[test]
    fn test_first_add_snapshots_then_increments() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(500)), 1);
        cart.add(&book_snapshot(1, dec!(999)), 2); // later price must not retrofit

        let line = &cart.lines["book:1"];
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, dec!(500));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(500)), 1);
        cart.remove(&CartKey::new(ProductType::Book, 99));
        assert_eq!(cart.lines.len(), 1);
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(500)), 5);
        cart.set_quantity(&CartKey::new(ProductType::Book, 1), 2);
        assert_eq!(cart.lines["book:1"].quantity, 2);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(500)), 5);
        cart.set_quantity(&CartKey::new(ProductType::Book, 1), 0);
        assert!(cart.is_empty());

        cart.add(&book_snapshot(1, dec!(500)), 5);
        cart.set_quantity(&CartKey::new(ProductType::Book, 1), -3);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_key_is_noop() {
        let mut cart = Cart::default();
        cart.set_quantity(&CartKey::new(ProductType::Book, 1), 4);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_summarize_totals() {
        // bookA price=500 qty=2, pen price=50 qty=3 => 1150 / 5
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(500)), 2);
        cart.add(&pen_snapshot(dec!(50)), 3);

        let summary = cart.summarize();
        assert_eq!(summary.total_amount, dec!(1150));
        assert_eq!(summary.total_quantity, 5);
        assert_eq!(summary.items.len(), 2);
    }

    #[test]
    fn test_summarize_empty_cart() {
        let summary = Cart::default().summarize();
        assert_eq!(summary.total_amount, Decimal::ZERO);
        assert_eq!(summary.total_quantity, 0);
        assert!(summary.items.is_empty());
    }

    #[test]
    fn test_exact_decimal_arithmetic() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(1, dec!(0.10)), 3);
        let summary = cart.summarize();
        assert_eq!(summary.total_amount, dec!(0.30));
    }

    #[test]
    fn test_cart_json_round_trip() {
        let mut cart = Cart::default();
        cart.add(&book_snapshot(2, dec!(340.50)), 2);

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
        assert_eq!(restored.summarize().total_amount, dec!(681.00));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Summary totals equal the sum over lines for any cart shape
    #[test]
    fn prop_summary_matches_line_sums() {
        proptest!(|(
            lines in prop::collection::vec((1i32..1000, 1u32..100, 1u32..100_000u32), 1..20)
        )| {
            let mut cart = Cart::default();
            for (id, quantity, price_cents) in &lines {
                let snapshot = ProductSnapshot {
                    product_type: ProductType::Book,
                    product_id: *id,
                    name: format!("Book {}", id),
                    unit_price: Decimal::from(*price_cents) / Decimal::from(100),
                    image_url: None,
                };
                cart.add(&snapshot, *quantity);
            }

            let summary = cart.summarize();
            let expected: Decimal = cart.lines.values().map(CartLine::subtotal).sum();
            let expected_quantity: u32 = cart.lines.values().map(|l| l.quantity).sum();

            prop_assert_eq!(summary.total_amount, expected);
            prop_assert_eq!(summary.total_quantity, expected_quantity);
            prop_assert!(summary.total_amount >= Decimal::ZERO);
        });
    }

    /// Adding then removing a line restores the previous total
    #[test]
    fn prop_add_remove_inverse() {
        proptest!(|(id in 1i32..1000, quantity in 1u32..50, price_cents in 1u32..100_000)| {
            let mut cart = Cart::default();
            let snapshot = ProductSnapshot {
                product_type: ProductType::Stationery,
                product_id: id,
                name: "Item".to_string(),
                unit_price: Decimal::from(price_cents) / Decimal::from(100),
                image_url: None,
            };

            let before = cart.summarize().total_amount;
            cart.add(&snapshot, quantity);
            cart.remove(&CartKey::new(ProductType::Stationery, id));
            prop_assert_eq!(cart.summarize().total_amount, before);
        });
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Loyalty card database model: one per user, created lazily on the
/// first purchase or the first birthday-bonus grant
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LoyaltyCard {
    pub id: i32,
    pub user_id: i32,
    pub card_number: String,
    /// Bonus balance, same unit as the currency; never negative
    pub balance: Decimal,
    /// Cumulative amount of all settled purchases
    pub total_spent: Decimal,
    /// Date of the most recent birthday-bonus grant
    pub last_birthday_bonus: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Card view returned to the owner
#[derive(Debug, Serialize)]
pub struct LoyaltyCardResponse {
    pub card_number: String,
    pub balance: Decimal,
    pub total_spent: Decimal,
    pub bonus_percentage: u32,
    pub birthday_bonus_granted: bool,
}

impl LoyaltyCardResponse {
    pub fn from_card(card: &LoyaltyCard, birthday_bonus_granted: bool) -> Self {
        Self {
            card_number: card.card_number.clone(),
            balance: card.balance,
            total_spent: card.total_spent,
            bonus_percentage: crate::loyalty::bonus_calculator::BonusCalculator::bonus_percentage(
                card.total_spent,
            ),
            birthday_bonus_granted,
        }
    }
}

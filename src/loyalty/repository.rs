// Loyalty card persistence
//
// The loyalty row is the one hot shared resource in settlement: every
// balance mutation inside a checkout goes through a FOR UPDATE lock, and
// debits are additionally guarded by a balance check in the UPDATE itself.

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::loyalty::error::LoyaltyError;
use crate::loyalty::models::LoyaltyCard;

const CARD_COLUMNS: &str =
    "id, user_id, card_number, balance, total_spent, last_birthday_bonus, created_at, updated_at";

/// Generate a random 16-digit card number
pub fn generate_card_number() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}

/// Repository for loyalty card operations
#[derive(Clone)]
pub struct LoyaltyRepository {
    pool: PgPool,
}

impl LoyaltyRepository {
    /// Create a new LoyaltyRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for service-managed transactions
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a user's loyalty card
    pub async fn find_by_user(&self, user_id: i32) -> Result<Option<LoyaltyCard>, LoyaltyError> {
        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            "SELECT {} FROM loyalty_cards WHERE user_id = $1",
            CARD_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Find a user's loyalty card and lock the row for the transaction
    pub async fn find_by_user_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
    ) -> Result<Option<LoyaltyCard>, LoyaltyError> {
        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            "SELECT {} FROM loyalty_cards WHERE user_id = $1 FOR UPDATE",
            CARD_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(card)
    }

    /// Create a card for a user, retrying card-number generation until it
    /// does not collide with an existing account
    pub async fn create(&self, user_id: i32) -> Result<LoyaltyCard, LoyaltyError> {
        let card_number = loop {
            let candidate = generate_card_number();
            let exists: (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM loyalty_cards WHERE card_number = $1)",
            )
            .bind(&candidate)
            .fetch_one(&self.pool)
            .await?;
            if !exists.0 {
                break candidate;
            }
        };

        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            "INSERT INTO loyalty_cards (user_id, card_number) VALUES ($1, $2) RETURNING {}",
            CARD_COLUMNS
        ))
        .bind(user_id)
        .bind(card_number)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created loyalty card {} for user {}", card.card_number, user_id);
        Ok(card)
    }

    /// Create a card inside a settlement transaction (lazy creation on
    /// first purchase)
    pub async fn create_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
    ) -> Result<LoyaltyCard, LoyaltyError> {
        let card_number = loop {
            let candidate = generate_card_number();
            let exists: (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM loyalty_cards WHERE card_number = $1)",
            )
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;
            if !exists.0 {
                break candidate;
            }
        };

        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            "INSERT INTO loyalty_cards (user_id, card_number) VALUES ($1, $2) RETURNING {}",
            CARD_COLUMNS
        ))
        .bind(user_id)
        .bind(card_number)
        .fetch_one(&mut **tx)
        .await?;

        Ok(card)
    }

    /// Overwrite balance and total_spent under the row lock held by the
    /// enclosing transaction
    pub async fn update_balances_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        card_id: i32,
        balance: Decimal,
        total_spent: Decimal,
    ) -> Result<LoyaltyCard, LoyaltyError> {
        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            r#"
            UPDATE loyalty_cards
            SET balance = $1, total_spent = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            CARD_COLUMNS
        ))
        .bind(balance)
        .bind(total_spent)
        .bind(card_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LoyaltyError::NotFound)?;

        Ok(card)
    }

    /// Debit the balance inside a transaction, guarded so the row can
    /// never go negative even if the lock discipline is violated
    pub async fn debit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        card_id: i32,
        amount: Decimal,
    ) -> Result<bool, LoyaltyError> {
        let result = sqlx::query(
            r#"
            UPDATE loyalty_cards
            SET balance = balance - $1, updated_at = NOW()
            WHERE id = $2 AND balance >= $1
            "#,
        )
        .bind(amount)
        .bind(card_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Debit a user's balance outside settlement; same non-negativity guard
    pub async fn debit(&self, user_id: i32, amount: Decimal) -> Result<bool, LoyaltyError> {
        let result = sqlx::query(
            r#"
            UPDATE loyalty_cards
            SET balance = balance - $1, updated_at = NOW()
            WHERE user_id = $2 AND balance >= $1
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unconditional credit (birthday grants)
    pub async fn credit(&self, card_id: i32, amount: Decimal) -> Result<(), LoyaltyError> {
        sqlx::query(
            "UPDATE loyalty_cards SET balance = balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(amount)
        .bind(card_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Credit the birthday bonus and stamp the grant date, guarded against
    /// a second grant in the same calendar year. Returns the updated card
    /// or None when this year's bonus was already recorded (e.g. by a
    /// concurrent profile view).
    pub async fn grant_birthday_bonus(
        &self,
        card_id: i32,
        amount: Decimal,
        today: NaiveDate,
    ) -> Result<Option<LoyaltyCard>, LoyaltyError> {
        let card = sqlx::query_as::<_, LoyaltyCard>(&format!(
            r#"
            UPDATE loyalty_cards
            SET balance = balance + $1, last_birthday_bonus = $2, updated_at = NOW()
            WHERE id = $3
              AND (last_birthday_bonus IS NULL
                   OR EXTRACT(YEAR FROM last_birthday_bonus) < $4)
            RETURNING {}
            "#,
            CARD_COLUMNS
        ))
        .bind(amount)
        .bind(today)
        .bind(card_id)
        .bind(chrono::Datelike::year(&today))
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Sum of the user's completed order totals (repair path)
    pub async fn sum_completed_orders(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
    ) -> Result<Decimal, LoyaltyError> {
        let (total,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_amount), 0) FROM orders \
             WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_number_shape() {
        for _ in 0..100 {
            let number = generate_card_number();
            assert_eq!(number.len(), 16);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_card_numbers_vary() {
        // 16 random digits colliding across a handful of draws would mean
        // a broken generator
        let numbers: std::collections::HashSet<String> =
            (0..50).map(|_| generate_card_number()).collect();
        assert!(numbers.len() > 45);
    }
}

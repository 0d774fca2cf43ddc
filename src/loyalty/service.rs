// Loyalty service: accrual, redemption, birthday grants, and the
// explicit balance repair operation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;

use crate::audit::diff::diff_loyalty_repair;
use crate::audit::models::{AuditAction, NewAuditEntry, RequestMeta};
use crate::audit::recorder::AuditSink;
use crate::loyalty::bonus_calculator::{BonusCalculator, BIRTHDAY_BONUS};
use crate::loyalty::error::LoyaltyError;
use crate::loyalty::models::LoyaltyCard;
use crate::loyalty::repository::LoyaltyRepository;

/// Outcome of a purchase accrual
#[derive(Debug, Clone)]
pub struct AccrualOutcome {
    pub card: LoyaltyCard,
    pub bonus: Decimal,
}

/// Service for loyalty account business logic
#[derive(Clone)]
pub struct LoyaltyService {
    repo: LoyaltyRepository,
    audit: Arc<dyn AuditSink>,
}

impl LoyaltyService {
    /// Create a new LoyaltyService
    pub fn new(repo: LoyaltyRepository, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, audit }
    }

    /// The user's card, if one exists
    pub async fn get_card(&self, user_id: i32) -> Result<Option<LoyaltyCard>, LoyaltyError> {
        self.repo.find_by_user(user_id).await
    }

    /// Card view with the birthday check the storefront runs on profile
    /// views. Returns the card plus whether the birthday bonus was granted
    /// just now; None when the user has no card and no bonus is due.
    ///
    /// A card is created on the spot when the bonus is due but the user
    /// never shopped. The grant itself is guarded per calendar year at the
    /// database row, so two concurrent views cannot double-grant.
    pub async fn view_card(
        &self,
        user_id: i32,
        birth_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Option<(LoyaltyCard, bool)>, LoyaltyError> {
        let card = self.repo.find_by_user(user_id).await?;

        let due = BonusCalculator::birthday_bonus_due(
            birth_date,
            card.as_ref().and_then(|c| c.last_birthday_bonus),
            today,
        );

        match (card, due) {
            (Some(card), false) => Ok(Some((card, false))),
            (Some(card), true) => {
                let granted = self
                    .repo
                    .grant_birthday_bonus(card.id, BIRTHDAY_BONUS, today)
                    .await?;
                match granted {
                    Some(updated) => {
                        tracing::info!(
                            "Birthday bonus of {} granted to user {}",
                            BIRTHDAY_BONUS,
                            user_id
                        );
                        Ok(Some((updated, true)))
                    }
                    // Lost the race to another view this year
                    None => Ok(Some((card, false))),
                }
            }
            (None, true) => {
                let card = self.repo.create(user_id).await?;
                let granted = self
                    .repo
                    .grant_birthday_bonus(card.id, BIRTHDAY_BONUS, today)
                    .await?;
                match granted {
                    Some(updated) => Ok(Some((updated, true))),
                    None => Ok(Some((card, false))),
                }
            }
            (None, false) => Ok(None),
        }
    }

    /// Unconditional credit, used for goodwill grants
    pub async fn add_bonus(&self, user_id: i32, amount: Decimal) -> Result<(), LoyaltyError> {
        let card = self
            .repo
            .find_by_user(user_id)
            .await?
            .ok_or(LoyaltyError::NotFound)?;
        self.repo.credit(card.id, amount).await
    }

    /// Debit exactly `amount`, rejecting debits the balance cannot cover
    pub async fn spend_bonus(&self, user_id: i32, amount: Decimal) -> Result<(), LoyaltyError> {
        if self.repo.find_by_user(user_id).await?.is_none() {
            return Err(LoyaltyError::NotFound);
        }
        if !self.repo.debit(user_id, amount).await? {
            return Err(LoyaltyError::InsufficientBalance);
        }
        Ok(())
    }

    /// Redemption step of settlement, under the enclosing transaction
    ///
    /// Caps the request at min(requested, balance, order total) and debits
    /// the capped amount. Returns the amount actually redeemed; a user
    /// without a card redeems nothing.
    pub async fn redeem_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        requested: Decimal,
        order_total: Decimal,
    ) -> Result<Decimal, LoyaltyError> {
        if requested <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        let Some(card) = self.repo.find_by_user_for_update(tx, user_id).await? else {
            return Ok(Decimal::ZERO);
        };

        let capped = BonusCalculator::redemption_cap(requested, card.balance, order_total);
        if capped <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        // The row is locked and capped <= balance, so a failed guard means
        // the lock discipline was broken elsewhere
        if !self.repo.debit_in_tx(tx, card.id, capped).await? {
            return Err(LoyaltyError::Conflict);
        }

        Ok(capped)
    }

    /// Accrual step of settlement, under the enclosing transaction
    ///
    /// Computes the bonus at the rate for the lifetime spend BEFORE this
    /// purchase, then adds the purchase to total_spent and the bonus to
    /// the balance. Creates the card lazily on a first purchase.
    pub async fn accrue_purchase_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        amount: Decimal,
    ) -> Result<AccrualOutcome, LoyaltyError> {
        let card = match self.repo.find_by_user_for_update(tx, user_id).await? {
            Some(card) => card,
            None => self.repo.create_in_tx(tx, user_id).await?,
        };

        let bonus = BonusCalculator::calculate_bonus(amount, card.total_spent);
        let updated = self
            .repo
            .update_balances_in_tx(tx, card.id, card.balance + bonus, card.total_spent + amount)
            .await?;

        Ok(AccrualOutcome {
            card: updated,
            bonus,
        })
    }

    /// One-time repair: backfill total_spent from completed orders
    ///
    /// Applies only to cards whose total_spent is zero, raises the balance
    /// to the floor implied by the backfilled spend, and never decreases
    /// an existing balance. Audited with the field-level changes.
    pub async fn repair_totals(
        &self,
        user_id: i32,
        meta: &RequestMeta,
    ) -> Result<LoyaltyCard, LoyaltyError> {
        let mut tx = self.repo.pool().begin().await?;

        let card = self
            .repo
            .find_by_user_for_update(&mut tx, user_id)
            .await?
            .ok_or(LoyaltyError::NotFound)?;

        if card.total_spent != Decimal::ZERO {
            tx.rollback().await?;
            return Ok(card);
        }

        let spent_from_orders = self.repo.sum_completed_orders(&mut tx, user_id).await?;
        if spent_from_orders <= Decimal::ZERO {
            tx.rollback().await?;
            return Ok(card);
        }

        let expected_balance = BonusCalculator::calculate_bonus(spent_from_orders, spent_from_orders);
        let new_balance = card.balance.max(expected_balance);

        let updated = self
            .repo
            .update_balances_in_tx(&mut tx, card.id, new_balance, spent_from_orders)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Repaired loyalty card {} for user {}: total_spent {} -> {}",
            updated.card_number,
            user_id,
            card.total_spent,
            updated.total_spent
        );

        self.audit
            .record(
                NewAuditEntry::new(AuditAction::Update)
                    .subject("LoyaltyCard", updated.id, format!("Card {}", updated.card_number))
                    .describe("Loyalty balance backfilled from order history")
                    .with_changes(diff_loyalty_repair(
                        &card.total_spent,
                        &updated.total_spent,
                        &card.balance,
                        &updated.balance,
                    ))
                    .with_meta(meta),
            )
            .await
            .map_err(|e| LoyaltyError::DatabaseError(e.to_string()))?;

        Ok(updated)
    }
}

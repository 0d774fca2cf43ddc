// Explicit per-entity field diffing for audit change logs
//
// Each auditable entity gets a hand-written diff over a fixed field list.
// No reflection: adding a field to the change log means adding it here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::models::User;
use crate::orders::models::OrderStatus;

/// Old/new pair for a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Map of field name to its change, ordered for stable serialization
pub type ChangeSet = BTreeMap<String, FieldChange>;

fn push_if_changed(
    changes: &mut ChangeSet,
    field: &str,
    old: Option<String>,
    new: Option<String>,
) {
    if old != new {
        changes.insert(field.to_string(), FieldChange { old, new });
    }
}

/// Diff for an order status transition
pub fn diff_order_status(old: OrderStatus, new: OrderStatus) -> ChangeSet {
    let mut changes = ChangeSet::new();
    push_if_changed(
        &mut changes,
        "status",
        Some(old.as_str().to_string()),
        Some(new.as_str().to_string()),
    );
    changes
}

/// Diff over the auditable profile fields of a user
pub fn diff_profile(old: &User, new: &User) -> ChangeSet {
    let mut changes = ChangeSet::new();
    push_if_changed(
        &mut changes,
        "first_name",
        old.first_name.clone(),
        new.first_name.clone(),
    );
    push_if_changed(
        &mut changes,
        "last_name",
        old.last_name.clone(),
        new.last_name.clone(),
    );
    push_if_changed(
        &mut changes,
        "middle_name",
        old.middle_name.clone(),
        new.middle_name.clone(),
    );
    push_if_changed(&mut changes, "phone", old.phone.clone(), new.phone.clone());
    push_if_changed(
        &mut changes,
        "birth_date",
        old.birth_date.map(|d| d.to_string()),
        new.birth_date.map(|d| d.to_string()),
    );
    changes
}

/// Diff for a loyalty card repair (balance backfill)
pub fn diff_loyalty_repair(
    old_total_spent: &rust_decimal::Decimal,
    new_total_spent: &rust_decimal::Decimal,
    old_balance: &rust_decimal::Decimal,
    new_balance: &rust_decimal::Decimal,
) -> ChangeSet {
    let mut changes = ChangeSet::new();
    push_if_changed(
        &mut changes,
        "total_spent",
        Some(old_total_spent.to_string()),
        Some(new_total_spent.to_string()),
    );
    push_if_changed(
        &mut changes,
        "balance",
        Some(old_balance.to_string()),
        Some(new_balance.to_string()),
    );
    changes
}

/// Serialize a change set to the JSON shape stored in the audit row:
/// `{field: {"old": ..., "new": ...}}`
pub fn changes_to_json(changes: &ChangeSet) -> serde_json::Value {
    serde_json::to_value(changes).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use crate::auth::models::Role;

    fn sample_user() -> User {
        User {
            id: 1,
            email: "reader@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            first_name: Some("Anna".to_string()),
            last_name: None,
            middle_name: None,
            phone: Some("+7 916 123-45-67".to_string()),
            birth_date: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_diff_single_field() {
        let changes = diff_order_status(OrderStatus::New, OrderStatus::Processing);
        assert_eq!(changes.len(), 1);
        let change = &changes["status"];
        assert_eq!(change.old.as_deref(), Some("new"));
        assert_eq!(change.new.as_deref(), Some("processing"));
    }

    #[test]
    fn test_status_diff_same_status_is_empty() {
        assert!(diff_order_status(OrderStatus::New, OrderStatus::New).is_empty());
    }

    #[test]
    fn test_profile_diff_only_changed_fields() {
        let old = sample_user();
        let mut new = sample_user();
        new.first_name = Some("Anya".to_string());
        new.birth_date = NaiveDate::from_ymd_opt(1990, 5, 14);

        let changes = diff_profile(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["first_name"].old.as_deref(), Some("Anna"));
        assert_eq!(changes["first_name"].new.as_deref(), Some("Anya"));
        assert_eq!(changes["birth_date"].old, None);
        assert_eq!(changes["birth_date"].new.as_deref(), Some("1990-05-14"));
    }

    #[test]
    fn test_loyalty_repair_diff() {
        let changes = diff_loyalty_repair(&dec!(0), &dec!(42000), &dec!(100), &dec!(1680));
        assert_eq!(changes["total_spent"].new.as_deref(), Some("42000"));
        assert_eq!(changes["balance"].old.as_deref(), Some("100"));
    }

    #[test]
    fn test_changes_json_shape() {
        let changes = diff_order_status(OrderStatus::Shipped, OrderStatus::Completed);
        let json = changes_to_json(&changes);
        assert_eq!(json["status"]["old"], "shipped");
        assert_eq!(json["status"]["new"], "completed");
    }
}

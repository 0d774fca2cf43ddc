use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::audit::diff::ChangeSet;

/// Maximum stored length of an object's string representation
pub const OBJECT_REPR_MAX: usize = 255;
/// Maximum stored length of a request path
pub const URL_PATH_MAX: usize = 500;

/// Kind of action recorded in the audit trail
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Login,
    Logout,
    Register,
    PasswordReset,
    Export,
    #[default]
    Other,
}

impl AuditAction {
    /// Convert action to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::View => "view",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::Register => "register",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::Export => "export",
            AuditAction::Other => "other",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted audit record
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: Option<i32>,
    pub action: AuditAction,
    pub model_name: Option<String>,
    pub object_id: Option<String>,
    pub object_repr: Option<String>,
    pub description: Option<String>,
    pub url_path: Option<String>,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An audit record under construction at a mutation site
///
/// The acting user set explicitly via `actor` wins over the ambient
/// request user carried by `RequestMeta`.
#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub user_id: Option<i32>,
    pub model_name: Option<String>,
    pub object_id: Option<String>,
    pub object_repr: Option<String>,
    pub description: Option<String>,
    pub changes: ChangeSet,
    pub url_path: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    /// Start a new entry for the given action kind
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    /// Set the acting user explicitly
    pub fn actor(mut self, user_id: Option<i32>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Attach the affected object (model name, id, display string)
    pub fn subject(
        mut self,
        model_name: &str,
        object_id: impl ToString,
        object_repr: impl Into<String>,
    ) -> Self {
        self.model_name = Some(model_name.to_string());
        self.object_id = Some(object_id.to_string());
        self.object_repr = Some(object_repr.into());
        self
    }

    /// Attach a human-readable description of the action
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach before/after field diffs
    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }

    /// Enrich the entry from the ambient request context
    ///
    /// Fills IP address, user agent, and request path, and falls back to
    /// the request's authenticated user when no actor was set explicitly.
    pub fn with_meta(mut self, meta: &RequestMeta) -> Self {
        if self.user_id.is_none() {
            self.user_id = meta.user_id;
        }
        if self.ip_address.is_none() {
            self.ip_address = meta.ip_address.clone();
        }
        if self.user_agent.is_none() {
            self.user_agent = meta.user_agent.clone();
        }
        if self.url_path.is_none() {
            self.url_path = meta.path.clone();
        }
        self
    }
}

/// Ambient request context for audit enrichment
///
/// Extraction never fails: every field is best-effort and absence is fine.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub user_id: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
}

/// Extracts the client IP: first hop of X-Forwarded-For when present
fn client_ip(parts: &Parts) -> Option<String> {
    let forwarded = parts.headers.get("x-forwarded-for")?.to_str().ok()?;
    let first_hop = forwarded.split(',').next()?.trim();
    if first_hop.is_empty() {
        None
    } else {
        Some(first_hop.to_string())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = crate::auth::middleware::authenticate_from_parts(parts)
            .ok()
            .map(|user| user.user_id);

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        Ok(RequestMeta {
            user_id,
            ip_address: client_ip(parts),
            user_agent,
            path: Some(parts.uri.path().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::diff::FieldChange;

    #[test]
    fn test_action_round_trip() {
        assert_eq!(AuditAction::Create.as_str(), "create");
        assert_eq!(AuditAction::PasswordReset.to_string(), "password_reset");
        assert_eq!(AuditAction::default(), AuditAction::Other);
    }

    #[test]
    fn test_entry_builder_collects_fields() {
        let mut changes = ChangeSet::new();
        changes.insert(
            "status".to_string(),
            FieldChange {
                old: Some("new".to_string()),
                new: Some("processing".to_string()),
            },
        );

        let entry = NewAuditEntry::new(AuditAction::Update)
            .actor(Some(4))
            .subject("Order", "57cbee31", "Order #57cbee31")
            .describe("Status changed")
            .with_changes(changes.clone());

        assert_eq!(entry.action, AuditAction::Update);
        assert_eq!(entry.user_id, Some(4));
        assert_eq!(entry.model_name.as_deref(), Some("Order"));
        assert_eq!(entry.object_id.as_deref(), Some("57cbee31"));
        assert_eq!(entry.changes, changes);
    }

    #[test]
    fn test_explicit_actor_wins_over_ambient_user() {
        let meta = RequestMeta {
            user_id: Some(10),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("curl/8".to_string()),
            path: Some("/api/orders".to_string()),
        };

        let entry = NewAuditEntry::new(AuditAction::Create)
            .actor(Some(99))
            .with_meta(&meta);
        assert_eq!(entry.user_id, Some(99));
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));

        let ambient = NewAuditEntry::new(AuditAction::Create).with_meta(&meta);
        assert_eq!(ambient.user_id, Some(10));
        assert_eq!(ambient.url_path.as_deref(), Some("/api/orders"));
    }

    #[test]
    fn test_meta_absence_is_fine() {
        let entry = NewAuditEntry::new(AuditAction::Login).with_meta(&RequestMeta::default());
        assert!(entry.user_id.is_none());
        assert!(entry.ip_address.is_none());
        assert!(entry.user_agent.is_none());
    }
}

// Audit trail recorder
//
// Every mutating code path calls an AuditSink explicitly; there is no
// implicit interception. Write durability is a deployment policy: the
// default swallows failures so the triggering operation is unaffected,
// the strict mode surfaces them.

use sqlx::PgPool;

use crate::audit::diff::changes_to_json;
use crate::audit::models::{
    AuditAction, AuditLogEntry, NewAuditEntry, OBJECT_REPR_MAX, URL_PATH_MAX,
};

/// What happens to the triggering operation when an audit write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPolicy {
    /// Failures are logged and swallowed
    #[default]
    BestEffort,
    /// Failures propagate to the caller
    Required,
}

impl AuditPolicy {
    /// Read the policy from the AUDIT_POLICY environment variable
    pub fn from_env() -> Self {
        match std::env::var("AUDIT_POLICY").as_deref() {
            Ok("required") => AuditPolicy::Required,
            _ => AuditPolicy::BestEffort,
        }
    }
}

/// Error type for audit persistence
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit write failed: {0}")]
    Write(#[from] sqlx::Error),
}

/// Sink for audit records, injected into each service that mutates state
#[axum::async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record to the audit trail
    async fn record(&self, entry: NewAuditEntry) -> Result<(), AuditError>;
}

/// PostgreSQL-backed audit recorder
#[derive(Clone)]
pub struct PgAuditRecorder {
    pool: PgPool,
    policy: AuditPolicy,
}

/// Truncate to a maximum number of characters, silently
fn truncate_chars(value: String, max: usize) -> String {
    if value.chars().count() <= max {
        value
    } else {
        value.chars().take(max).collect()
    }
}

impl PgAuditRecorder {
    /// Create a new PgAuditRecorder
    pub fn new(pool: PgPool, policy: AuditPolicy) -> Self {
        Self { pool, policy }
    }

    async fn insert(&self, entry: &NewAuditEntry) -> Result<(), sqlx::Error> {
        let object_repr = entry
            .object_repr
            .clone()
            .map(|repr| truncate_chars(repr, OBJECT_REPR_MAX));
        let url_path = entry
            .url_path
            .clone()
            .map(|path| truncate_chars(path, URL_PATH_MAX));

        sqlx::query(
            r#"
            INSERT INTO audit_log
                (user_id, action, model_name, object_id, object_repr,
                 description, url_path, changes, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(&entry.model_name)
        .bind(&entry.object_id)
        .bind(object_repr)
        .bind(&entry.description)
        .bind(url_path)
        .bind(changes_to_json(&entry.changes))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List recent audit records with optional filters (admin back office)
    pub async fn list(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT id, user_id, action, model_name, object_id, object_repr, \
             description, url_path, changes, ip_address, user_agent, created_at \
             FROM audit_log",
        );

        let mut clauses = Vec::new();
        let mut param_index = 0;
        if filter.action.is_some() {
            param_index += 1;
            clauses.push(format!("action = ${}", param_index));
        }
        if filter.model_name.is_some() {
            param_index += 1;
            clauses.push(format!("model_name = ${}", param_index));
        }
        if filter.user_id.is_some() {
            param_index += 1;
            clauses.push(format!("user_id = ${}", param_index));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");
        sql.push_str(&format!(" LIMIT {}", filter.limit.unwrap_or(100).min(500)));

        let mut query = sqlx::query_as::<_, AuditLogEntry>(&sql);
        if let Some(action) = filter.action {
            query = query.bind(action);
        }
        if let Some(ref model_name) = filter.model_name {
            query = query.bind(model_name.clone());
        }
        if let Some(user_id) = filter.user_id {
            query = query.bind(user_id);
        }

        query.fetch_all(&self.pool).await
    }

    /// Delete one audit record. Administrative escape hatch only; normal
    /// operation never removes entries.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM audit_log WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[axum::async_trait]
impl AuditSink for PgAuditRecorder {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), AuditError> {
        match self.insert(&entry).await {
            Ok(()) => Ok(()),
            Err(e) => match self.policy {
                AuditPolicy::BestEffort => {
                    tracing::warn!(
                        "Audit write failed for action '{}' on {:?}: {}",
                        entry.action,
                        entry.model_name,
                        e
                    );
                    Ok(())
                }
                AuditPolicy::Required => Err(AuditError::Write(e)),
            },
        }
    }
}

/// Filters accepted by the audit listing endpoint
#[derive(Debug, Default, serde::Deserialize)]
pub struct AuditQueryFilter {
    pub action: Option<AuditAction>,
    pub model_name: Option<String>,
    pub user_id: Option<i32>,
    pub limit: Option<i64>,
}

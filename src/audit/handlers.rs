// HTTP handlers for the audit back office (admin only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::audit::models::AuditLogEntry;
use crate::audit::recorder::AuditQueryFilter;
use crate::auth::middleware::AuthenticatedUser;
use crate::auth::models::Role;
use crate::error::ApiError;

/// Handler for GET /api/admin/audit
/// Lists recent audit records with optional action/model/user filters
pub async fn list_audit_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<AuditQueryFilter>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    user.ensure_role(Role::Admin)
        .map_err(|e| ApiError::Forbidden(e.to_string()))?;

    let entries = state.audit.list(&filter).await?;
    Ok(Json(entries))
}

/// Handler for DELETE /api/admin/audit/{id}
/// Removes one audit record; restricted to administrators
pub async fn delete_audit_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.ensure_role(Role::Admin)
        .map_err(|e| ApiError::Forbidden(e.to_string()))?;

    let deleted = state.audit.delete(id).await?;
    if !deleted {
        return Err(ApiError::NotFound {
            resource: "AuditLogEntry".to_string(),
            id: id.to_string(),
        });
    }

    tracing::info!("Audit record {} deleted by user {}", id, user.user_id);
    Ok(StatusCode::NO_CONTENT)
}

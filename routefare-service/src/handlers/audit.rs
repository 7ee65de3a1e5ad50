//! Admin audit-trail read surface (spec §4.K / §6): every transition the
//! booking/payment reducers recorded, filterable by entity, actor, action,
//! and date range.

use axum::extract::{Query, State};
use axum::Json;
use routefare_auth::Role;
use routefare_domain::{AuditEntry, AuditQuery};
use routefare_web::auth_extractor::AuthContext;
use routefare_web::AppError;
use serde::Deserialize;

use crate::state::AppState;

/// Query params for `GET /v1/admin/audit`, mirroring [`AuditQuery`] but
/// `Deserialize`-friendly for `axum`'s query extractor (flat `Option`s).
#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    /// Restrict to this entity type (e.g. `"booking"`, `"payment"`).
    pub entity_type: Option<String>,
    /// Restrict to this entity id.
    pub entity_id: Option<String>,
    /// Restrict to entries performed by this actor.
    pub actor_id: Option<uuid::Uuid>,
    /// Restrict to this action name.
    pub action: Option<String>,
    /// Restrict to entries recorded on or after this instant.
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    /// Restrict to entries recorded before this instant.
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ListAuditQuery> for AuditQuery {
    fn from(q: ListAuditQuery) -> Self {
        Self {
            entity_type: q.entity_type,
            entity_id: q.entity_id,
            actor_id: q.actor_id,
            action: q.action,
            from: q.from,
            to: q.to,
        }
    }
}

/// `GET /v1/admin/audit[?entity_type&entity_id&actor_id&action&from&to]`
/// (admin-only).
pub async fn list_audit_entries(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    auth.require_role(Role::Admin)?;
    let entries = state.audit_log.query(query.into()).await.map_err(AppError::internal)?;
    Ok(Json(entries))
}

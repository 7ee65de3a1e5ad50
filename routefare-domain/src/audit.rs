//! Append-only audit log (spec §4.K).
//!
//! Written by the state-machine harness on every transition, and by
//! explicit admin actions. Never mutated or deleted once written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique id of this audit row.
    pub id: Uuid,
    /// The kind of entity this entry describes (e.g. `"booking"`).
    pub entity_type: String,
    /// The entity's id, as a string (entities use different id types).
    pub entity_id: String,
    /// The action performed (e.g. `"transition"`, `"refund"`).
    pub action: String,
    /// Who performed it, if known (system-triggered transitions have none).
    pub actor_id: Option<Uuid>,
    /// The actor's role at the time, if known.
    pub actor_role: Option<String>,
    /// Free-form before/after or parameter data.
    pub changes: Value,
    /// Request metadata (correlation id, IP, user agent), if available.
    pub request_metadata: Option<Value>,
    /// When this entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry for an arbitrary recorded action, not necessarily a
    /// state transition (e.g. a gateway checkout being created).
    #[must_use]
    pub fn event(
        entity_type: &str,
        entity_id: impl std::fmt::Display,
        action: &str,
        changes: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor_id: None,
            actor_role: None,
            changes,
            request_metadata: None,
            recorded_at: now,
        }
    }

    /// Build an entry for a state-machine transition.
    #[must_use]
    pub fn transition(
        entity_type: &str,
        entity_id: impl std::fmt::Display,
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self::event(
            entity_type,
            entity_id,
            "transition",
            serde_json::json!({
                "from": format!("{from:?}"),
                "to": format!("{to:?}"),
                "reason": reason,
            }),
            now,
        )
    }

    /// Attach the actor who triggered this entry.
    #[must_use]
    pub fn with_actor(mut self, actor_id: Uuid, role: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id);
        self.actor_role = Some(role.into());
        self
    }
}

/// Append-only persistence port for [`AuditEntry`] rows, written by the
/// booking/payment reducers' effect batches alongside the domain event
/// itself (never in place of it — the audit log is a read-side record,
/// not the source of truth).
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Persist one entry. Best-effort: callers log and continue on
    /// failure rather than fail the command the entry describes.
    ///
    /// # Errors
    ///
    /// Returns a message if the backend write fails.
    async fn record(&self, entry: AuditEntry) -> Result<(), String>;

    /// Query the log, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a message if the backend query fails.
    async fn query(&self, filter: AuditQuery) -> Result<Vec<AuditEntry>, String>;
}

/// Query filters for the audit log's read surface: by entity, actor,
/// action, or date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Restrict to this entity type.
    pub entity_type: Option<String>,
    /// Restrict to this entity id.
    pub entity_id: Option<String>,
    /// Restrict to entries performed by this actor.
    pub actor_id: Option<Uuid>,
    /// Restrict to this action name.
    pub action: Option<String>,
    /// Restrict to entries recorded on or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Restrict to entries recorded before this instant.
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_entry_captures_from_and_to() {
        let entry = AuditEntry::transition(
            "booking",
            "b-1",
            "PENDING",
            "HELD",
            "Seats held",
            Utc::now(),
        );
        assert_eq!(entry.entity_type, "booking");
        assert_eq!(entry.changes["reason"], "Seats held");
    }

    #[test]
    fn with_actor_sets_both_fields() {
        let actor = Uuid::new_v4();
        let entry =
            AuditEntry::transition("payment", "p-1", "PENDING", "SUCCESS", "webhook", Utc::now())
                .with_actor(actor, "ADMIN");
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.actor_role.as_deref(), Some("ADMIN"));
    }
}

//! `PostgreSQL`-backed [`AuditLog`], the read-side append-only record of
//! every transition the booking/payment reducers commit.

use async_trait::async_trait;
use routefare_domain::{AuditEntry, AuditLog, AuditQuery};
use sqlx::PgPool;

/// `PostgreSQL`-backed audit log.
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO audit_log (
                id, entity_type, entity_id, action, actor_id, actor_role,
                changes, request_metadata, recorded_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            ",
        )
        .bind(entry.id)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(entry.actor_id)
        .bind(&entry.actor_role)
        .bind(&entry.changes)
        .bind(&entry.request_metadata)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("audit log insert failed: {e}"))?;
        Ok(())
    }

    async fn query(&self, filter: AuditQuery) -> Result<Vec<AuditEntry>, String> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r"
            SELECT id, entity_type, entity_id, action, actor_id, actor_role,
                   changes, request_metadata, recorded_at
            FROM audit_log
            WHERE ($1::TEXT IS NULL OR entity_type = $1)
              AND ($2::TEXT IS NULL OR entity_id = $2)
              AND ($3::UUID IS NULL OR actor_id = $3)
              AND ($4::TEXT IS NULL OR action = $4)
              AND ($5::TIMESTAMPTZ IS NULL OR recorded_at >= $5)
              AND ($6::TIMESTAMPTZ IS NULL OR recorded_at < $6)
            ORDER BY recorded_at DESC
            LIMIT 500
            ",
        )
        .bind(filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.actor_id)
        .bind(filter.action)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("audit log query failed: {e}"))?;
        Ok(rows.into_iter().map(AuditRow::into_entry).collect())
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: uuid::Uuid,
    entity_type: String,
    entity_id: String,
    action: String,
    actor_id: Option<uuid::Uuid>,
    actor_role: Option<String>,
    changes: serde_json::Value,
    request_metadata: Option<serde_json::Value>,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

impl AuditRow {
    fn into_entry(self) -> AuditEntry {
        AuditEntry {
            id: self.id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
            actor_id: self.actor_id,
            actor_role: self.actor_role,
            changes: self.changes,
            request_metadata: self.request_metadata,
            recorded_at: self.recorded_at,
        }
    }
}

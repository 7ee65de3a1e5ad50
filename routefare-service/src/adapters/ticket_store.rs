//! `PostgreSQL`-backed [`TicketStore`] and [`VerificationLogSink`] (spec
//! §4.J), grounded the same way as the booking/payment projections: a
//! thin row-struct plus `sqlx::query_as`, no generic KV framework.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use routefare_domain::{BookingId, DriverId, MerkleBatchId, PaymentId, RiderId, TicketId};
use routefare_ticketing::ticketing::{TicketStore, VerificationLogSink};
use routefare_ticketing::types::{
    BatchStatus, MerkleBatch, MerkleProof, Ticket, TicketBody, TicketStatus, VerificationLogEntry,
    VerificationMethod, VerificationResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// `PostgreSQL`-backed ticket, batch, and proof storage.
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Batches in a given lifecycle state, for the scheduler's anchor and
    /// confirmation-poll jobs — not part of [`TicketStore`] since nothing
    /// else needs it.
    pub async fn list_batches_by_status(&self, status: BatchStatus) -> Result<Vec<MerkleBatch>, String> {
        let rows: Vec<BatchRow> = sqlx::query_as("SELECT * FROM merkle_batches WHERE status = $1 ORDER BY created_at")
            .bind(batch_status_str(status))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| format!("batch listing failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_batch).collect())
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_id: Uuid,
    booking_id: Uuid,
    rider_id: Uuid,
    driver_id: Uuid,
    vehicle_id: String,
    ride_type: String,
    scheduled_time: DateTime<Utc>,
    pickup: String,
    dropoff: String,
    fare: Decimal,
    payment_id: Uuid,
    status: String,
    hash: String,
    signature: String,
    merkle_batch_id: Uuid,
    leaf_index: Option<i32>,
    issued_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

fn ticket_status_str(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Issued => "ISSUED",
        TicketStatus::Revoked => "REVOKED",
    }
}

fn parse_ticket_status(s: &str) -> TicketStatus {
    match s {
        "REVOKED" => TicketStatus::Revoked,
        _ => TicketStatus::Issued,
    }
}

fn row_to_ticket(row: TicketRow) -> Ticket {
    Ticket {
        body: TicketBody {
            ticket_id: TicketId::from(row.ticket_id),
            booking_id: BookingId::from(row.booking_id),
            rider_id: RiderId::from(row.rider_id),
            driver_id: DriverId::from(row.driver_id),
            vehicle_id: row.vehicle_id,
            ride_type: row.ride_type,
            scheduled_time: row.scheduled_time,
            pickup: row.pickup,
            dropoff: row.dropoff,
            fare: row.fare,
            payment_id: PaymentId::from(row.payment_id),
        },
        status: parse_ticket_status(&row.status),
        hash: row.hash,
        signature: row.signature,
        merkle_batch_id: MerkleBatchId::from(row.merkle_batch_id),
        leaf_index: row.leaf_index.and_then(|i| usize::try_from(i).ok()),
        issued_at: row.issued_at,
        revoked_at: row.revoked_at,
    }
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    status: String,
    ticket_ids: Vec<Uuid>,
    root: Option<String>,
    anchor_tx_hash: Option<String>,
    confirmations: i32,
    created_at: DateTime<Utc>,
    anchored_at: Option<DateTime<Utc>>,
}

fn batch_status_str(status: BatchStatus) -> &'static str {
    match status {
        BatchStatus::Pending => "PENDING",
        BatchStatus::Ready => "READY",
        BatchStatus::Anchored => "ANCHORED",
        BatchStatus::Confirmed => "CONFIRMED",
    }
}

fn parse_batch_status(s: &str) -> BatchStatus {
    match s {
        "READY" => BatchStatus::Ready,
        "ANCHORED" => BatchStatus::Anchored,
        "CONFIRMED" => BatchStatus::Confirmed,
        _ => BatchStatus::Pending,
    }
}

fn row_to_batch(row: BatchRow) -> MerkleBatch {
    MerkleBatch {
        id: MerkleBatchId::from(row.id),
        status: parse_batch_status(&row.status),
        ticket_ids: row.ticket_ids.into_iter().map(TicketId::from).collect(),
        root: row.root,
        anchor_tx_hash: row.anchor_tx_hash,
        confirmations: u32::try_from(row.confirmations).unwrap_or_default(),
        created_at: row.created_at,
        anchored_at: row.anchored_at,
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn save_ticket(&self, ticket: &Ticket) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO tickets (
                ticket_id, booking_id, rider_id, driver_id, vehicle_id, ride_type,
                scheduled_time, pickup, dropoff, fare, payment_id, status, hash,
                signature, merkle_batch_id, leaf_index, issued_at, revoked_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            ON CONFLICT (ticket_id) DO UPDATE SET
                status = EXCLUDED.status,
                merkle_batch_id = EXCLUDED.merkle_batch_id,
                leaf_index = EXCLUDED.leaf_index,
                revoked_at = EXCLUDED.revoked_at
            ",
        )
        .bind(ticket.body.ticket_id.as_uuid())
        .bind(ticket.body.booking_id.as_uuid())
        .bind(ticket.body.rider_id.as_uuid())
        .bind(ticket.body.driver_id.as_uuid())
        .bind(&ticket.body.vehicle_id)
        .bind(&ticket.body.ride_type)
        .bind(ticket.body.scheduled_time)
        .bind(&ticket.body.pickup)
        .bind(&ticket.body.dropoff)
        .bind(ticket.body.fare)
        .bind(ticket.body.payment_id.as_uuid())
        .bind(ticket_status_str(ticket.status))
        .bind(&ticket.hash)
        .bind(&ticket.signature)
        .bind(ticket.merkle_batch_id.as_uuid())
        .bind(ticket.leaf_index.and_then(|i| i32::try_from(i).ok()))
        .bind(ticket.issued_at)
        .bind(ticket.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("ticket save failed: {e}"))?;
        Ok(())
    }

    async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, String> {
        let row: Option<TicketRow> = sqlx::query_as("SELECT * FROM tickets WHERE ticket_id = $1")
            .bind(ticket_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| format!("ticket lookup failed: {e}"))?;
        Ok(row.map(row_to_ticket))
    }

    async fn save_batch(&self, batch: &MerkleBatch) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO merkle_batches (
                id, status, ticket_ids, root, anchor_tx_hash, confirmations,
                created_at, anchored_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                ticket_ids = EXCLUDED.ticket_ids,
                root = EXCLUDED.root,
                anchor_tx_hash = EXCLUDED.anchor_tx_hash,
                confirmations = EXCLUDED.confirmations,
                anchored_at = EXCLUDED.anchored_at
            ",
        )
        .bind(batch.id.as_uuid())
        .bind(batch_status_str(batch.status))
        .bind(batch.ticket_ids.iter().map(|t| *t.as_uuid()).collect::<Vec<Uuid>>())
        .bind(&batch.root)
        .bind(&batch.anchor_tx_hash)
        .bind(i32::try_from(batch.confirmations).unwrap_or(i32::MAX))
        .bind(batch.created_at)
        .bind(batch.anchored_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("batch save failed: {e}"))?;
        Ok(())
    }

    async fn update_batch(&self, batch: &MerkleBatch) -> Result<(), String> {
        self.save_batch(batch).await
    }

    async fn find_batch(&self, batch_id: MerkleBatchId) -> Result<Option<MerkleBatch>, String> {
        let row: Option<BatchRow> = sqlx::query_as("SELECT * FROM merkle_batches WHERE id = $1")
            .bind(batch_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| format!("batch lookup failed: {e}"))?;
        Ok(row.map(row_to_batch))
    }

    async fn save_proof(&self, proof: &MerkleProof) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO merkle_proofs (batch_id, leaf_index, siblings)
            VALUES ($1, $2, $3)
            ON CONFLICT (batch_id, leaf_index) DO UPDATE SET siblings = EXCLUDED.siblings
            ",
        )
        .bind(proof.batch_id.as_uuid())
        .bind(i32::try_from(proof.leaf_index).unwrap_or(i32::MAX))
        .bind(&proof.siblings)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("proof save failed: {e}"))?;
        Ok(())
    }

    async fn find_proof(&self, batch_id: MerkleBatchId, leaf_index: usize) -> Result<Option<MerkleProof>, String> {
        let row: Option<(Uuid, i32, Vec<String>)> = sqlx::query_as(
            "SELECT batch_id, leaf_index, siblings FROM merkle_proofs WHERE batch_id = $1 AND leaf_index = $2",
        )
        .bind(batch_id.as_uuid())
        .bind(i32::try_from(leaf_index).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("proof lookup failed: {e}"))?;
        Ok(row.map(|(batch_id, leaf_index, siblings)| MerkleProof {
            batch_id: MerkleBatchId::from(batch_id),
            leaf_index: usize::try_from(leaf_index).unwrap_or_default(),
            siblings,
        }))
    }
}

/// `PostgreSQL`-backed append-only verification log sink.
pub struct PostgresVerificationLogSink {
    pool: PgPool,
}

impl PostgresVerificationLogSink {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn method_str(method: VerificationMethod) -> &'static str {
    match method {
        VerificationMethod::Database => "DATABASE",
        VerificationMethod::Signature => "SIGNATURE",
        VerificationMethod::MerkleProof => "MERKLE_PROOF",
    }
}

fn result_str(result: VerificationResult) -> &'static str {
    match result {
        VerificationResult::Valid => "VALID",
        VerificationResult::Invalid => "INVALID",
        VerificationResult::Expired => "EXPIRED",
        VerificationResult::Revoked => "REVOKED",
        VerificationResult::NotFound => "NOT_FOUND",
    }
}

#[async_trait]
impl VerificationLogSink for PostgresVerificationLogSink {
    async fn log(&self, entry: VerificationLogEntry) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO verification_log (
                ticket_id, method, verifier_id, result, ip_address, user_agent,
                notes, logged_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ",
        )
        .bind(entry.ticket_id.map(|t| *t.as_uuid()))
        .bind(method_str(entry.method))
        .bind(&entry.verifier_id)
        .bind(result_str(entry.result))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.notes)
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("verification log insert failed: {e}"))?;
        Ok(())
    }
}

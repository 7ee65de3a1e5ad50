//! `PostgreSQL`-backed [`PaymentProjectionQuery`], plus the extra read
//! queries the HTTP/admin handlers and the reconciliation job need.

use chrono::{DateTime, NaiveDate, Utc};
use routefare_domain::{BookingId, PaymentId};
use routefare_payment::types::{Payment, PaymentStatus, ReconciliationOutcome, ReconciliationRecord};
use routefare_payment::PaymentProjectionQuery;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-backed payment read model.
pub struct PostgresPaymentProjection {
    pool: PgPool,
}

impl PostgresPaymentProjection {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a payment snapshot, replacing any prior row (upsert).
    ///
    /// # Errors
    ///
    /// Returns a message if the write fails.
    pub async fn upsert(&self, payment: &Payment) -> Result<(), String> {
        sqlx::query(
            r"
            INSERT INTO payments (
                id, booking_id, amount, currency, customer_email, customer_name,
                status, gateway_reference, checkout_url, transaction_id,
                idempotency_key, expires_at, completed_at, failure_reason,
                refund_amount, refund_reason, refunded_at, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                checkout_url = EXCLUDED.checkout_url,
                transaction_id = EXCLUDED.transaction_id,
                expires_at = EXCLUDED.expires_at,
                completed_at = EXCLUDED.completed_at,
                failure_reason = EXCLUDED.failure_reason,
                refund_amount = EXCLUDED.refund_amount,
                refund_reason = EXCLUDED.refund_reason,
                refunded_at = EXCLUDED.refunded_at
            ",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.booking_id.as_uuid())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.customer_email)
        .bind(&payment.customer_name)
        .bind(status_str(payment.status))
        .bind(&payment.gateway_reference)
        .bind(&payment.checkout_url)
        .bind(&payment.transaction_id)
        .bind(&payment.idempotency_key)
        .bind(payment.expires_at)
        .bind(payment.completed_at)
        .bind(&payment.failure_reason)
        .bind(payment.refund_amount)
        .bind(&payment.refund_reason)
        .bind(payment.refunded_at)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("payment upsert failed: {e}"))?;
        Ok(())
    }

    /// A rider's own payments, most recent first. Joins through `bookings`
    /// since `payments` has no `rider_id` column of its own.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_for_rider(&self, rider_id: uuid::Uuid) -> Result<Vec<Payment>, String> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r"
            SELECT p.* FROM payments p
            JOIN bookings b ON b.id = p.booking_id
            WHERE b.rider_id = $1
            ORDER BY p.created_at DESC
            ",
        )
        .bind(rider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("payment list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    /// Admin listing, optionally filtered by status and/or rider.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_admin(
        &self,
        status: Option<PaymentStatus>,
        rider_id: Option<uuid::Uuid>,
    ) -> Result<Vec<Payment>, String> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r"
            SELECT p.* FROM payments p
            JOIN bookings b ON b.id = p.booking_id
            WHERE ($1::text IS NULL OR p.status = $1)
              AND ($2::uuid IS NULL OR b.rider_id = $2)
            ORDER BY p.created_at DESC
            ",
        )
        .bind(status.map(status_str))
        .bind(rider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("admin payment list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    /// Persist one reconciliation run's rows (spec §4.H, §4.L admin reads).
    ///
    /// # Errors
    ///
    /// Returns a message if any row's write fails.
    pub async fn save_reconciliation_records(&self, records: &[ReconciliationRecord]) -> Result<(), String> {
        for record in records {
            sqlx::query(
                r"
                INSERT INTO reconciliation_records (reconciled_date, payment_id, outcome, details, reconciled_at)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(record.date)
            .bind(record.payment_id.as_uuid())
            .bind(reconciliation_outcome_str(record.outcome))
            .bind(&record.details)
            .bind(record.reconciled_at)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("reconciliation record insert failed: {e}"))?;
        }
        Ok(())
    }

    /// Most recent reconciliation rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_reconciliation(&self, limit: i64) -> Result<Vec<ReconciliationRecord>, String> {
        let rows: Vec<ReconciliationRow> = sqlx::query_as(
            r"
            SELECT reconciled_date, payment_id, outcome, details, reconciled_at
            FROM reconciliation_records
            ORDER BY reconciled_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("reconciliation list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_reconciliation).collect())
    }

    /// Reconciliation rows whose outcome is `DISCREPANCY`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a message if the query fails.
    pub async fn list_discrepancies(&self) -> Result<Vec<ReconciliationRecord>, String> {
        let rows: Vec<ReconciliationRow> = sqlx::query_as(
            r"
            SELECT reconciled_date, payment_id, outcome, details, reconciled_at
            FROM reconciliation_records
            WHERE outcome = 'DISCREPANCY'
            ORDER BY reconciled_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("discrepancy list failed: {e}"))?;
        Ok(rows.into_iter().map(row_to_reconciliation).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ReconciliationRow {
    reconciled_date: NaiveDate,
    payment_id: uuid::Uuid,
    outcome: String,
    details: Option<String>,
    reconciled_at: DateTime<Utc>,
}

fn reconciliation_outcome_str(outcome: ReconciliationOutcome) -> &'static str {
    match outcome {
        ReconciliationOutcome::Matched => "MATCHED",
        ReconciliationOutcome::Discrepancy => "DISCREPANCY",
    }
}

fn row_to_reconciliation(row: ReconciliationRow) -> ReconciliationRecord {
    ReconciliationRecord {
        date: row.reconciled_date,
        payment_id: PaymentId::from(row.payment_id),
        outcome: match row.outcome.as_str() {
            "DISCREPANCY" => ReconciliationOutcome::Discrepancy,
            _ => ReconciliationOutcome::Matched,
        },
        details: row.details,
        reconciled_at: row.reconciled_at,
    }
}

impl PaymentProjectionQuery for PostgresPaymentProjection {
    fn load_payment(
        &self,
        payment_id: PaymentId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Payment>, String>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<PaymentRow> = sqlx::query_as("SELECT * FROM payments WHERE id = $1")
                .bind(payment_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| format!("payment lookup failed: {e}"))?;
            Ok(row.map(row_to_payment))
        })
    }

    fn load_payment_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Payment>, String>> + Send + '_>> {
        Box::pin(async move {
            let row: Option<PaymentRow> = sqlx::query_as(
                r"
                SELECT * FROM payments WHERE booking_id = $1
                  AND status NOT IN ('FAILED', 'REFUNDED')
                ORDER BY created_at DESC LIMIT 1
                ",
            )
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| format!("payment lookup failed: {e}"))?;
            Ok(row.map(row_to_payment))
        })
    }

    fn load_payment_by_reference(
        &self,
        gateway_reference: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Payment>, String>> + Send + '_>> {
        let gateway_reference = gateway_reference.to_string();
        Box::pin(async move {
            let row: Option<PaymentRow> =
                sqlx::query_as("SELECT * FROM payments WHERE gateway_reference = $1")
                    .bind(&gateway_reference)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| format!("payment lookup failed: {e}"))?;
            Ok(row.map(row_to_payment))
        })
    }

    fn list_payments_for_date(
        &self,
        date: NaiveDate,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Payment>, String>> + Send + '_>> {
        Box::pin(async move {
            let rows: Vec<PaymentRow> =
                sqlx::query_as("SELECT * FROM payments WHERE created_at::date = $1")
                    .bind(date)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| format!("payment list failed: {e}"))?;
            Ok(rows.into_iter().map(row_to_payment).collect())
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: uuid::Uuid,
    booking_id: uuid::Uuid,
    amount: Decimal,
    currency: String,
    customer_email: String,
    customer_name: String,
    status: String,
    gateway_reference: String,
    checkout_url: Option<String>,
    transaction_id: Option<String>,
    idempotency_key: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    refund_amount: Option<Decimal>,
    refund_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Initiated => "INITIATED",
        PaymentStatus::Pending => "PENDING",
        PaymentStatus::Success => "SUCCESS",
        PaymentStatus::Failed => "FAILED",
        PaymentStatus::Refunded => "REFUNDED",
        PaymentStatus::Completed => "COMPLETED",
    }
}

fn parse_status(s: &str) -> PaymentStatus {
    match s {
        "PENDING" => PaymentStatus::Pending,
        "SUCCESS" => PaymentStatus::Success,
        "FAILED" => PaymentStatus::Failed,
        "REFUNDED" => PaymentStatus::Refunded,
        "COMPLETED" => PaymentStatus::Completed,
        _ => PaymentStatus::Initiated,
    }
}

fn row_to_payment(row: PaymentRow) -> Payment {
    Payment {
        id: PaymentId::from(row.id),
        booking_id: BookingId::from(row.booking_id),
        amount: row.amount,
        currency: row.currency,
        customer_email: row.customer_email,
        customer_name: row.customer_name,
        status: parse_status(&row.status),
        gateway_reference: row.gateway_reference,
        checkout_url: row.checkout_url,
        transaction_id: row.transaction_id,
        idempotency_key: row.idempotency_key,
        expires_at: row.expires_at,
        completed_at: row.completed_at,
        failure_reason: row.failure_reason,
        refund_amount: row.refund_amount,
        refund_reason: row.refund_reason,
        refunded_at: row.refunded_at,
        created_at: row.created_at,
    }
}

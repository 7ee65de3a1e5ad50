//! Scheduled reconciliation (spec §4.H): for date D-1, compare every local
//! payment against the gateway's own ledger and write a
//! [`ReconciliationRecord`] per payment, noting discrepancies.
//!
//! This runs outside the reducer — it reads through [`PaymentProjectionQuery`]
//! and [`PaymentGateway`] rather than dispatching commands, since it never
//! mutates payment state itself (a discrepancy is surfaced for an operator
//! or `verifyPayment` to resolve, not auto-corrected).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::gateway::{GatewayChargeStatus, GatewayTransaction, PaymentGateway};
use crate::payment::PaymentProjectionQuery;
use crate::types::{Payment, ReconciliationOutcome, ReconciliationRecord};

/// Run reconciliation for `date`, comparing every local payment created
/// that day against the gateway's transaction ledger.
///
/// # Errors
///
/// Returns an error if either the local projection or the gateway ledger
/// cannot be read at all; per-payment mismatches are reported as
/// [`ReconciliationOutcome::Discrepancy`] rows, not errors.
pub async fn run_reconciliation(
    date: NaiveDate,
    projection: Arc<dyn PaymentProjectionQuery>,
    gateway: Arc<dyn PaymentGateway>,
) -> Result<Vec<ReconciliationRecord>, String> {
    let local_payments = projection.list_payments_for_date(date).await?;
    let gateway_transactions = gateway
        .list_transactions_for_date(date)
        .await
        .map_err(|e| format!("gateway ledger unavailable: {e}"))?;

    let by_reference: HashMap<&str, &GatewayTransaction> = gateway_transactions
        .iter()
        .map(|t| (t.gateway_reference.as_str(), t))
        .collect();

    let now = Utc::now();
    let mut records = Vec::with_capacity(local_payments.len());

    for payment in &local_payments {
        let record = reconcile_one(payment, by_reference.get(payment.gateway_reference.as_str()).copied(), date, now);
        if record.outcome == ReconciliationOutcome::Discrepancy {
            crate::metrics::record_reconciliation_discrepancy();
        }
        records.push(record);
    }

    Ok(records)
}

fn reconcile_one(
    payment: &Payment,
    gateway_txn: Option<&GatewayTransaction>,
    date: NaiveDate,
    now: chrono::DateTime<Utc>,
) -> ReconciliationRecord {
    let Some(txn) = gateway_txn else {
        return ReconciliationRecord {
            date,
            payment_id: payment.id,
            outcome: ReconciliationOutcome::Discrepancy,
            details: Some("no matching gateway transaction found".to_string()),
            reconciled_at: now,
        };
    };

    if amounts_disagree(payment.amount, txn.amount) {
        return ReconciliationRecord {
            date,
            payment_id: payment.id,
            outcome: ReconciliationOutcome::Discrepancy,
            details: Some(format!(
                "amount mismatch: local {} vs gateway {}",
                payment.amount, txn.amount
            )),
            reconciled_at: now,
        };
    }

    if statuses_disagree(payment, txn.status) {
        return ReconciliationRecord {
            date,
            payment_id: payment.id,
            outcome: ReconciliationOutcome::Discrepancy,
            details: Some(format!(
                "status mismatch: local {:?} vs gateway {:?}",
                payment.status, txn.status
            )),
            reconciled_at: now,
        };
    }

    ReconciliationRecord {
        date,
        payment_id: payment.id,
        outcome: ReconciliationOutcome::Matched,
        details: None,
        reconciled_at: now,
    }
}

fn amounts_disagree(local: Decimal, gateway: Decimal) -> bool {
    local != gateway
}

fn statuses_disagree(payment: &Payment, gateway_status: GatewayChargeStatus) -> bool {
    use routefare_domain::PaymentStatus;
    match gateway_status {
        GatewayChargeStatus::Succeeded => !matches!(
            payment.status,
            PaymentStatus::Success | PaymentStatus::Refunded | PaymentStatus::Completed
        ),
        GatewayChargeStatus::Failed => payment.status != PaymentStatus::Failed,
        GatewayChargeStatus::Pending => !matches!(
            payment.status,
            PaymentStatus::Initiated | PaymentStatus::Pending
        ),
    }
}

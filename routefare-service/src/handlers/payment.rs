//! Payment HTTP handlers (spec §4.H / §6): checkout initiation, webhook
//! ingestion, refunds, and rider/admin reads.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use routefare_auth::Role;
use routefare_domain::PaymentId;
use routefare_payment::types::{GatewayEventType, InitiatePaymentRequest, Payment, PaymentStatus, WebhookPayload};
use routefare_payment::PaymentAction;
use routefare_web::auth_extractor::AuthContext;
use routefare_web::AppError;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

fn payment_not_found(payment_id: PaymentId) -> AppError {
    AppError::not_found("payment", payment_id)
}

/// Request body for `POST /api/v1/payments`, narrower than
/// [`InitiatePaymentRequest`] — the caller never supplies an idempotency
/// key from outside the authenticated session's control.
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentBody {
    /// Booking being paid for.
    pub booking_id: routefare_domain::BookingId,
    /// Charge amount.
    pub amount: Decimal,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Customer email, for receipts.
    pub customer_email: String,
    /// Customer display name.
    pub customer_name: String,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// `POST /v1/payments/initiate`
pub async fn initiate_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<InitiatePaymentBody>,
) -> Result<Json<Payment>, AppError> {
    auth.require_role(Role::Rider)?;

    let idempotency_key = body.idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = InitiatePaymentRequest {
        booking_id: body.booking_id,
        amount: body.amount,
        currency: body.currency,
        customer_email: body.customer_email,
        customer_name: body.customer_name,
        idempotency_key: Some(idempotency_key.clone()),
    };

    let mut handle = state.payment_store.send(PaymentAction::InitiatePayment { request }).await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("initiatePayment timed out waiting for effects"))?;

    let (payment, error) = state
        .payment_store
        .state(|s| (s.find_by_idempotency_key(&idempotency_key).cloned(), s.last_error.clone()))
        .await;

    payment
        .map(Json)
        .ok_or_else(|| error.map_or_else(|| AppError::internal("payment was not recorded"), AppError::validation))
}

/// `GET /v1/payments/booking/{bookingId}`
pub async fn get_payment_by_booking(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(booking_id): Path<routefare_domain::BookingId>,
) -> Result<Json<Payment>, AppError> {
    use routefare_payment::PaymentProjectionQuery;
    let payment = state
        .payment_projection
        .load_payment_for_booking(booking_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("payment", booking_id))?;

    if auth.require_role(Role::Admin).is_err() {
        use routefare_booking::BookingProjectionQuery;
        let booking = state
            .booking_projection
            .load_booking(booking_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| AppError::not_found("booking", booking_id))?;
        if *booking.rider_id.as_uuid() != auth.0.sub {
            return Err(AppError::forbidden("not your payment"));
        }
    }

    Ok(Json(payment))
}

/// `GET /v1/payments/my-payments`
pub async fn my_payments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.payment_projection.list_for_rider(auth.0.sub).await.map_err(AppError::internal)?;
    Ok(Json(payments))
}

/// `GET /v1/payments/{id}`
pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    use routefare_payment::PaymentProjectionQuery;
    let payment = state
        .payment_projection
        .load_payment(payment_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| payment_not_found(payment_id))?;

    if auth.require_role(Role::Admin).is_err() {
        use routefare_booking::BookingProjectionQuery;
        let booking = state
            .booking_projection
            .load_booking(payment.booking_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| payment_not_found(payment_id))?;
        if *booking.rider_id.as_uuid() != auth.0.sub {
            return Err(AppError::forbidden("not your payment"));
        }
    }

    Ok(Json(payment))
}

/// Query params for `GET /v1/admin/payments`.
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    /// Filter by status.
    pub status: Option<String>,
    /// Filter by rider.
    pub rider_id: Option<Uuid>,
}

/// `GET /v1/admin/payments[?status&riderId]` (admin-only).
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    auth.require_role(Role::Admin)?;
    let status = query.status.as_deref().map(parse_status_filter).transpose()?;
    let payments = state.payment_projection.list_admin(status, query.rider_id).await.map_err(AppError::internal)?;
    Ok(Json(payments))
}

fn parse_status_filter(s: &str) -> Result<PaymentStatus, AppError> {
    match s {
        "INITIATED" => Ok(PaymentStatus::Initiated),
        "PENDING" => Ok(PaymentStatus::Pending),
        "SUCCESS" => Ok(PaymentStatus::Success),
        "FAILED" => Ok(PaymentStatus::Failed),
        "REFUNDED" => Ok(PaymentStatus::Refunded),
        "COMPLETED" => Ok(PaymentStatus::Completed),
        other => Err(AppError::bad_request(format!("unknown payment status {other}"))),
    }
}

/// Raw webhook body, before the signature-verified payload is decoded.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    /// The gateway reference this event concerns.
    pub gateway_reference: String,
    /// Which kind of event this is.
    pub event_type: GatewayEventType,
    /// The gateway's transaction id, once charged.
    pub transaction_id: Option<String>,
    /// Why the charge failed, if it did.
    pub failure_reason: Option<String>,
}

/// `POST /v1/webhooks/gateway`
///
/// Verifies the `X-Gateway-Signature` header against the raw body before
/// trusting anything in it, per spec §4.H "reject with 400 if the
/// signature doesn't verify."
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    raw_body: axum::body::Bytes,
) -> Result<axum::http::StatusCode, AppError> {
    let signature = headers
        .get("X-Gateway-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing X-Gateway-Signature header"))?;

    if !routefare_payment::verify_signature(state.config.webhook.gateway_webhook_secret.as_bytes(), &raw_body, signature) {
        return Err(AppError::bad_request("webhook signature verification failed"));
    }

    let body: WebhookBody = serde_json::from_slice(&raw_body).map_err(|e| AppError::bad_request(e.to_string()))?;
    let payload = WebhookPayload {
        gateway_reference: body.gateway_reference,
        event_type: body.event_type,
        transaction_id: body.transaction_id,
        failure_reason: body.failure_reason,
    };

    let mut handle = state.payment_store.send(PaymentAction::ProcessWebhook { payload }).await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("processWebhook timed out waiting for effects"))?;

    Ok(axum::http::StatusCode::OK)
}

/// Request body for `POST /v1/admin/payments/{id}/refund`.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Amount to refund; omit for a full refund.
    pub amount: Option<Decimal>,
    /// Reason for the refund.
    pub reason: String,
}

/// `POST /v1/admin/payments/{id}/refund` (admin-only).
pub async fn refund_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<PaymentId>,
    Json(body): Json<RefundRequest>,
) -> Result<Json<Payment>, AppError> {
    auth.require_role(Role::Admin)?;

    let mut handle = state
        .payment_store
        .send(PaymentAction::RefundPayment { payment_id, amount: body.amount, reason: body.reason })
        .await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("refundPayment timed out waiting for effects"))?;

    let (payment, error) = state.payment_store.state(|s| (s.get(&payment_id).cloned(), s.last_error.clone())).await;

    match payment {
        Some(payment) if payment.status == PaymentStatus::Refunded => Ok(Json(payment)),
        _ => Err(error.map_or_else(|| payment_not_found(payment_id), AppError::validation)),
    }
}

/// `POST /v1/payments/{id}/verify`: re-query the gateway and reconcile
/// local state if it disagrees (spec §4.H "verifyPayment").
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    let existing = state
        .payment_projection
        .load_payment(payment_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| payment_not_found(payment_id))?;

    if auth.require_role(Role::Admin).is_err() {
        use routefare_booking::BookingProjectionQuery;
        let booking = state
            .booking_projection
            .load_booking(existing.booking_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| payment_not_found(payment_id))?;
        if *booking.rider_id.as_uuid() != auth.0.sub {
            return Err(AppError::forbidden("not your payment"));
        }
    }

    let mut handle = state.payment_store.send(PaymentAction::VerifyPayment { payment_id }).await;
    handle
        .wait_with_timeout(DISPATCH_TIMEOUT)
        .await
        .map_err(|()| AppError::timeout("verifyPayment timed out waiting for effects"))?;

    let (payment, error) = state.payment_store.state(|s| (s.get(&payment_id).cloned(), s.last_error.clone())).await;
    payment.map(Json).ok_or_else(|| error.map_or_else(|| payment_not_found(payment_id), AppError::validation))
}

/// `POST /v1/admin/payments/expire` (admin-only): sweep every `PENDING`
/// payment past [`routefare_payment::types::PAYMENT_EXPIRY`] and
/// re-verify each against the gateway, letting the reducer settle it to
/// `FAILED` if the gateway agrees it never completed.
pub async fn expire_payments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<PaymentId>>, AppError> {
    auth.require_role(Role::Admin)?;

    let pending = state
        .payment_projection
        .list_admin(Some(PaymentStatus::Pending), None)
        .await
        .map_err(AppError::internal)?;

    let now = chrono::Utc::now();
    let mut swept = Vec::new();
    for payment in pending {
        let Some(expires_at) = payment.expires_at else { continue };
        if expires_at > now {
            continue;
        }
        let mut handle = state.payment_store.send(PaymentAction::VerifyPayment { payment_id: payment.id }).await;
        let _ = handle.wait_with_timeout(DISPATCH_TIMEOUT).await;
        swept.push(payment.id);
    }

    Ok(Json(swept))
}

/// Query params for `POST /v1/admin/reconciliation/run`.
#[derive(Debug, Deserialize)]
pub struct RunReconciliationQuery {
    /// Date to reconcile, `YYYY-MM-DD`.
    pub date: chrono::NaiveDate,
}

/// `POST /v1/admin/reconciliation/run?date=YYYY-MM-DD` (admin-only).
pub async fn run_reconciliation(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<RunReconciliationQuery>,
) -> Result<Json<Vec<routefare_payment::types::ReconciliationRecord>>, AppError> {
    auth.require_role(Role::Admin)?;

    let records =
        routefare_payment::run_reconciliation(query.date, state.payment_projection_query.clone(), state.payment_gateway.clone())
            .await
            .map_err(AppError::internal)?;

    state.payment_projection.save_reconciliation_records(&records).await.map_err(AppError::internal)?;
    Ok(Json(records))
}

/// Query params for `GET /v1/admin/reconciliation`.
#[derive(Debug, Deserialize)]
pub struct ListReconciliationQuery {
    /// Max rows to return; defaults to 100.
    #[serde(default = "default_reconciliation_limit")]
    pub limit: i64,
}

const fn default_reconciliation_limit() -> i64 {
    100
}

/// `GET /v1/admin/reconciliation[?limit]` (admin-only).
pub async fn list_reconciliation(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListReconciliationQuery>,
) -> Result<Json<Vec<routefare_payment::types::ReconciliationRecord>>, AppError> {
    auth.require_role(Role::Admin)?;
    let records = state.payment_projection.list_reconciliation(query.limit).await.map_err(AppError::internal)?;
    Ok(Json(records))
}

/// `GET /v1/admin/reconciliation/discrepancies` (admin-only).
pub async fn list_discrepancies(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<routefare_payment::types::ReconciliationRecord>>, AppError> {
    auth.require_role(Role::Admin)?;
    let records = state.payment_projection.list_discrepancies().await.map_err(AppError::internal)?;
    Ok(Json(records))
}

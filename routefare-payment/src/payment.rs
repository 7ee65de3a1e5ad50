//! Payment Core (spec §4.H): `initiatePayment`, `processWebhook`,
//! `refund`, `verifyPayment`.
//!
//! Adapted from `examples/ticketing/src/aggregates/payment.rs`'s
//! `PaymentReducer`: commands validate synchronously where they can and
//! defer gateway calls to `Effect::Future` blocks that resolve to a
//! terminal event. Unlike the teacher's demo reducer (which always
//! simulates success), every gateway interaction here goes through the
//! injected [`PaymentGateway`] and [`BookingClient`] boundaries, and the
//! six-state machine in `routefare_domain::state_machine` is enforced via
//! `transition_to` rather than assumed.

use chrono::Utc;
use routefare_core::{
    append_events, effect::Effect, environment::Clock, event::SerializedEvent,
    event_bus::EventBus, event_store::EventStore, publish_event, reducer::Reducer, smallvec,
    stream::StreamId, SmallVec,
};
use routefare_domain::idempotency::RedisIdempotencyStore;
use routefare_domain::lock::booking_lock_key;
use routefare_domain::{
    transition_to, AuditEntry, AuditLog, BookingId, DistributedLock, IdempotencyStore, PaymentId,
    PaymentStatus, StateMachine,
};
use routefare_macros::Action;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::booking_client::{cancel_booking_with_retry, confirm_booking_with_retry, BookingClient};
use crate::gateway::{GatewayChargeStatus, PaymentGateway};
use crate::types::{
    GatewayEventType, InitiatePaymentRequest, Payment, WebhookPayload, MIN_AMOUNT, PAYMENT_EXPIRY,
};

const IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const WEBHOOK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_LEASE: Duration = Duration::from_secs(10);

/// Loads payment snapshots on demand, mirroring the booking core's
/// `BookingProjectionQuery` and the teacher's `PaymentProjectionQuery`.
pub trait PaymentProjectionQuery: Send + Sync {
    /// Load a payment by id.
    fn load_payment(
        &self,
        payment_id: PaymentId,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Payment>, String>> + Send + '_>>;

    /// Load the active payment for a booking, if one exists (spec §4.H
    /// "one active payment per booking").
    fn load_payment_for_booking(
        &self,
        booking_id: BookingId,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Payment>, String>> + Send + '_>>;

    /// Load a payment by its gateway reference, used by `processWebhook`.
    fn load_payment_by_reference(
        &self,
        gateway_reference: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Payment>, String>> + Send + '_>>;

    /// Load every payment created on `date`, used by the scheduled
    /// reconciliation job (spec §4.H).
    fn list_payments_for_date(
        &self,
        date: chrono::NaiveDate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Payment>, String>> + Send + '_>>;
}

/// Actions for the Payment aggregate.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum PaymentAction {
    // ===== Commands =====
    /// Start a checkout for a booking.
    #[command]
    InitiatePayment {
        /// The incoming request.
        request: InitiatePaymentRequest,
    },
    /// Ingest a signature-verified gateway webhook event.
    #[command]
    ProcessWebhook {
        /// The decoded, already-verified payload.
        payload: WebhookPayload,
    },
    /// Refund a successful payment (admin-only).
    #[command]
    RefundPayment {
        /// Payment to refund.
        payment_id: PaymentId,
        /// Amount to refund; `None` means the full charged amount.
        amount: Option<Decimal>,
        /// Reason for the refund.
        reason: String,
    },
    /// Re-query the gateway and reconcile local state if it disagrees.
    #[command]
    VerifyPayment {
        /// Payment to verify.
        payment_id: PaymentId,
    },

    // ===== Events =====
    /// A payment record was created in INITIATED.
    #[event]
    PaymentInitiated {
        /// The fully-populated payment record.
        payment: Box<Payment>,
    },
    /// `initiatePayment` was rejected by validation (not a gateway failure).
    #[event]
    PaymentRejected {
        /// The idempotency key that was rejected, if one was on hand.
        idempotency_key: Option<String>,
        /// Why.
        reason: String,
    },
    /// A prior `initiatePayment` call is being replayed for this
    /// idempotency key.
    #[event]
    PaymentReplayed {
        /// The payment id the idempotency key already maps to.
        payment_id: PaymentId,
        /// The stored payment, if it could be loaded.
        payment: Option<Box<Payment>>,
    },
    /// The gateway returned a checkout URL; payment moved to PENDING.
    #[event]
    CheckoutCreated {
        /// Payment id.
        payment_id: PaymentId,
        /// Checkout URL to redirect the customer to.
        checkout_url: String,
    },
    /// The gateway confirmed a charge succeeded.
    #[event]
    PaymentSucceeded {
        /// Payment id.
        payment_id: PaymentId,
        /// Gateway transaction id.
        transaction_id: String,
        /// When the gateway confirmed success.
        completed_at: chrono::DateTime<Utc>,
    },
    /// The gateway reported a charge failed (or a local/gateway timeout).
    #[event]
    PaymentFailed {
        /// Payment id.
        payment_id: PaymentId,
        /// Why.
        reason: String,
        /// When it failed.
        failed_at: chrono::DateTime<Utc>,
    },
    /// A payment was refunded.
    #[event]
    PaymentRefunded {
        /// Payment id.
        payment_id: PaymentId,
        /// Amount refunded.
        amount: Decimal,
        /// Reason given.
        reason: String,
        /// When refunded.
        refunded_at: chrono::DateTime<Utc>,
    },
    /// A webhook event was recognized as a duplicate and acknowledged
    /// without action.
    #[event]
    WebhookDuplicate {
        /// The gateway reference the duplicate concerned.
        gateway_reference: String,
    },
    /// A command failed validation unrelated to payment creation.
    #[event]
    ValidationFailed {
        /// Error message.
        error: String,
    },
    /// A payment snapshot was (re)loaded from the projection.
    #[event]
    PaymentStateLoaded {
        /// The payment id that was loaded for.
        payment_id: PaymentId,
        /// The loaded snapshot, if one existed.
        payment: Option<Box<Payment>>,
    },
}

/// Dependencies for the Payment reducer.
#[derive(Clone)]
pub struct PaymentEnvironment {
    /// Clock for timestamps and expiry calculation.
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence.
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing `payment.*` topics.
    pub event_bus: Arc<dyn EventBus>,
    /// Stream id for this aggregate instance.
    pub stream_id: StreamId,
    /// Projection query for loading payment snapshots on demand.
    pub projection: Arc<dyn PaymentProjectionQuery>,
    /// The third-party charge gateway.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Cross-service integrator call into the booking core (§4.L).
    pub booking_client: Arc<dyn BookingClient>,
    /// Distributed lock service (§4.A) — guards the "one active payment per
    /// booking" invariant.
    pub lock: Arc<DistributedLock>,
    /// Idempotency store (§4.B).
    pub idempotency: Arc<RedisIdempotencyStore>,
    /// Append-only audit log (§4.K).
    pub audit_log: Arc<dyn AuditLog>,
}

/// In-memory payment snapshots, hydrated on demand from the projection.
#[derive(Debug, Default)]
pub struct PaymentState {
    payments: HashMap<PaymentId, Payment>,
    loaded: std::collections::HashSet<PaymentId>,
    /// Last validation/business error, surfaced to callers.
    pub last_error: Option<String>,
}

impl PaymentState {
    /// An empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a payment snapshot.
    #[must_use]
    pub fn get(&self, payment_id: &PaymentId) -> Option<&Payment> {
        self.payments.get(payment_id)
    }

    /// Find a payment created from a given idempotency key, among those
    /// this process has handled since it started. Lets `initiatePayment`
    /// callers recover the payment just created without the reducer
    /// exposing an internally-generated id up front.
    #[must_use]
    pub fn find_by_idempotency_key(&self, key: &str) -> Option<&Payment> {
        self.payments.values().find(|p| p.idempotency_key.as_deref() == Some(key))
    }

    fn is_loaded(&self, payment_id: &PaymentId) -> bool {
        self.loaded.contains(payment_id)
    }
}

fn serialize(action: &PaymentAction) -> Result<SerializedEvent, String> {
    let event_type = format!("Payment{action:?}")
        .split('(')
        .next()
        .unwrap_or("Unknown")
        .to_string();
    let data = bincode::serialize(action).map_err(|e| format!("serialization error: {e}"))?;
    Ok(SerializedEvent::new(event_type, data, None))
}

/// Reducer for the Payment aggregate.
#[derive(Clone, Debug, Default)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// A new reducer instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append the event to the event store, publish it on `topic`, and —
    /// when `audit` is given — write it to [`PaymentEnvironment::audit_log`]
    /// in the same effect batch, so a transition and its audit record are
    /// never observed apart (spec §4.K).
    fn create_effects(
        event: PaymentAction,
        env: &PaymentEnvironment,
        topic: &'static str,
        audit: Option<AuditEntry>,
    ) -> SmallVec<[Effect<PaymentAction>; 4]> {
        let Ok(serialized) = serialize(&event) else {
            return SmallVec::new();
        };
        let mut effects: SmallVec<[Effect<PaymentAction>; 4]> = smallvec![
            append_events! {
                store: env.event_store,
                stream: env.stream_id.as_str(),
                expected_version: None,
                events: vec![serialized.clone()],
                on_success: |_version| None,
                on_error: |error| Some(PaymentAction::ValidationFailed {
                    error: error.to_string(),
                })
            },
            publish_event! {
                bus: env.event_bus,
                topic: topic,
                event: serialized,
                on_success: || None,
                on_error: |error| Some(PaymentAction::ValidationFailed {
                    error: error.to_string(),
                })
            }
        ];
        if let Some(entry) = audit {
            let audit_log = env.audit_log.clone();
            effects.push(Effect::Future(Box::pin(async move {
                if let Err(error) = audit_log.record(entry).await {
                    tracing::warn!(%error, "failed to record audit entry");
                }
                None
            })));
        }
        effects
    }

    fn apply_event(state: &mut PaymentState, action: &PaymentAction) {
        match action {
            PaymentAction::PaymentInitiated { payment } => {
                state.payments.insert(payment.id, (**payment).clone());
                state.loaded.insert(payment.id);
                state.last_error = None;
                crate::metrics::record_payment_initiated();
            }
            PaymentAction::CheckoutCreated {
                payment_id,
                checkout_url,
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    if payment.status.can_transition_to(PaymentStatus::Pending) {
                        payment.status = PaymentStatus::Pending;
                        payment.checkout_url = Some(checkout_url.clone());
                    } else {
                        tracing::warn!(%payment_id, status = ?payment.status, "ignoring out-of-order checkout_created");
                    }
                }
                state.last_error = None;
            }
            PaymentAction::PaymentSucceeded {
                payment_id,
                transaction_id,
                completed_at,
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    if payment.status.can_transition_to(PaymentStatus::Success) {
                        payment.status = PaymentStatus::Success;
                        payment.transaction_id = Some(transaction_id.clone());
                        payment.completed_at = Some(*completed_at);
                        payment.expires_at = None;
                    } else {
                        tracing::warn!(%payment_id, status = ?payment.status, "ignoring illegal transition to SUCCESS");
                    }
                }
                state.last_error = None;
                crate::metrics::record_payment_succeeded();
            }
            PaymentAction::PaymentFailed {
                payment_id,
                reason,
                failed_at,
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    if payment.status.can_transition_to(PaymentStatus::Failed) {
                        payment.status = PaymentStatus::Failed;
                        payment.failure_reason = Some(reason.clone());
                        payment.expires_at = None;
                    } else {
                        tracing::warn!(%payment_id, status = ?payment.status, "ignoring illegal transition to FAILED");
                    }
                }
                let _ = failed_at;
                state.last_error = Some(reason.clone());
                crate::metrics::record_payment_failed();
            }
            PaymentAction::PaymentRefunded {
                payment_id,
                amount,
                reason,
                refunded_at,
            } => {
                if let Some(payment) = state.payments.get_mut(payment_id) {
                    if payment.status.can_transition_to(PaymentStatus::Refunded) {
                        payment.status = PaymentStatus::Refunded;
                        payment.refund_amount = Some(*amount);
                        payment.refund_reason = Some(reason.clone());
                        payment.refunded_at = Some(*refunded_at);
                    } else {
                        tracing::warn!(%payment_id, status = ?payment.status, "ignoring illegal transition to REFUNDED");
                    }
                }
                state.last_error = None;
                crate::metrics::record_payment_refunded(*amount);
            }
            PaymentAction::PaymentRejected { reason, .. }
            | PaymentAction::ValidationFailed { error: reason } => {
                state.last_error = Some(reason.clone());
            }
            PaymentAction::WebhookDuplicate { .. } => {
                state.last_error = None;
            }
            PaymentAction::PaymentReplayed { payment_id, payment } => {
                state.loaded.insert(*payment_id);
                if let Some(payment) = payment {
                    state.payments.insert(*payment_id, (**payment).clone());
                }
                state.last_error = None;
            }
            PaymentAction::PaymentStateLoaded { payment_id, payment } => {
                state.loaded.insert(*payment_id);
                if let Some(payment) = payment {
                    state.payments.insert(*payment_id, (**payment).clone());
                }
                state.last_error = None;
            }
            PaymentAction::InitiatePayment { .. }
            | PaymentAction::ProcessWebhook { .. }
            | PaymentAction::RefundPayment { .. }
            | PaymentAction::VerifyPayment { .. } => {}
        }
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = PaymentEnvironment;

    #[allow(clippy::too_many_lines)] // Complex saga orchestration required
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            PaymentAction::InitiatePayment { request } => {
                if let Some(error) = validate_initiate_request(&request) {
                    let event = PaymentAction::PaymentRejected {
                        idempotency_key: request.idempotency_key,
                        reason: error,
                    };
                    Self::apply_event(state, &event);
                    return SmallVec::new();
                }

                let projection = env.projection.clone();
                let gateway = env.gateway.clone();
                let lock = env.lock.clone();
                let idempotency = env.idempotency.clone();
                let clock = env.clock.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    Some(initiate_payment_outcome(request, projection, gateway, lock, idempotency, clock).await)
                }))]
            }

            PaymentAction::PaymentInitiated { ref payment } => {
                let audit = AuditEntry::transition(
                    "payment",
                    payment.id,
                    PaymentStatus::Initiated,
                    payment.status,
                    "initiatePayment",
                    env.clock.now(),
                );
                Self::apply_event(state, &action);
                Self::create_effects(action, env, "payment.initiated", Some(audit))
            }

            PaymentAction::CheckoutCreated { payment_id, .. } => {
                let previous_status = state.get(&payment_id).map(|p| p.status);
                Self::apply_event(state, &action);
                let audit = previous_status
                    .filter(|from| from.can_transition_to(PaymentStatus::Pending))
                    .map(|from| {
                        AuditEntry::transition(
                            "payment",
                            payment_id,
                            from,
                            PaymentStatus::Pending,
                            "gateway checkout created",
                            env.clock.now(),
                        )
                    });
                Self::create_effects(action, env, "payment.checkout_created", audit)
            }

            PaymentAction::PaymentRejected { .. } | PaymentAction::PaymentReplayed { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            }

            PaymentAction::ProcessWebhook { payload } => {
                let projection = env.projection.clone();
                let idempotency = env.idempotency.clone();
                let clock = env.clock.clone();
                let booking_client = env.booking_client.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    Some(process_webhook_outcome(payload, projection, idempotency, clock, booking_client).await)
                }))]
            }

            PaymentAction::PaymentSucceeded { payment_id, .. } => {
                // `confirmBooking` was already dispatched from
                // `process_webhook_outcome` before this event was built —
                // booking confirmation is not a further effect of applying it.
                let previous_status = state.get(&payment_id).map(|p| p.status);
                Self::apply_event(state, &action);
                let audit = previous_status
                    .filter(|from| from.can_transition_to(PaymentStatus::Success))
                    .map(|from| {
                        AuditEntry::transition(
                            "payment",
                            payment_id,
                            from,
                            PaymentStatus::Success,
                            "gateway charge succeeded",
                            env.clock.now(),
                        )
                    });
                Self::create_effects(action, env, "payment.succeeded", audit)
            }

            PaymentAction::PaymentFailed { payment_id, .. } => {
                let previous_status = state.get(&payment_id).map(|p| p.status);
                Self::apply_event(state, &action);
                let audit = previous_status
                    .filter(|from| from.can_transition_to(PaymentStatus::Failed))
                    .map(|from| {
                        AuditEntry::transition(
                            "payment",
                            payment_id,
                            from,
                            PaymentStatus::Failed,
                            "gateway charge failed",
                            env.clock.now(),
                        )
                    });
                Self::create_effects(action, env, "payment.failed", audit)
            }

            PaymentAction::WebhookDuplicate { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            }

            PaymentAction::RefundPayment {
                payment_id,
                amount,
                reason,
            } => {
                if !state.is_loaded(&payment_id) {
                    return hydrate_then_retry(
                        payment_id,
                        env,
                        PaymentAction::RefundPayment {
                            payment_id,
                            amount,
                            reason,
                        },
                    );
                }

                let Some(payment) = state.payments.get(&payment_id) else {
                    Self::apply_event(
                        state,
                        &PaymentAction::ValidationFailed {
                            error: format!("payment {payment_id} not found"),
                        },
                    );
                    return SmallVec::new();
                };

                if let Err(error) = validate_refund(payment, amount) {
                    Self::apply_event(state, &PaymentAction::ValidationFailed { error });
                    return SmallVec::new();
                }

                let previous_status = payment.status;
                let refund_amount = amount.unwrap_or(payment.amount);
                let now = env.clock.now();
                let audit = AuditEntry::transition(
                    "payment",
                    payment_id,
                    previous_status,
                    PaymentStatus::Refunded,
                    reason.as_str(),
                    now,
                );
                let event = PaymentAction::PaymentRefunded {
                    payment_id,
                    amount: refund_amount,
                    reason,
                    refunded_at: now,
                };
                Self::apply_event(state, &event);
                tracing::info!(%payment_id, %refund_amount, "payment refunded, audit entry recorded");
                Self::create_effects(event, env, "payment.refunded", Some(audit))
            }

            PaymentAction::VerifyPayment { payment_id } => {
                if !state.is_loaded(&payment_id) {
                    return hydrate_then_retry(
                        payment_id,
                        env,
                        PaymentAction::VerifyPayment { payment_id },
                    );
                }

                let Some(payment) = state.payments.get(&payment_id) else {
                    return SmallVec::new();
                };

                let gateway_reference = payment.gateway_reference.clone();
                let local_status = payment.status;
                let gateway = env.gateway.clone();
                let clock = env.clock.clone();

                smallvec![Effect::Future(Box::pin(async move {
                    verify_payment_outcome(payment_id, gateway_reference, local_status, gateway, clock).await
                }))]
            }

            PaymentAction::ValidationFailed { .. } | PaymentAction::PaymentStateLoaded { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            }
        }
    }
}

fn hydrate_then_retry(
    payment_id: PaymentId,
    env: &PaymentEnvironment,
    original: PaymentAction,
) -> SmallVec<[Effect<PaymentAction>; 4]> {
    let projection = env.projection.clone();
    smallvec![Effect::Sequential(vec![
        Effect::Future(Box::pin(async move {
            let payment = projection.load_payment(payment_id).await.ok().flatten();
            Some(PaymentAction::PaymentStateLoaded {
                payment_id,
                payment: payment.map(Box::new),
            })
        })),
        Effect::Future(Box::pin(async move { Some(original) })),
    ])]
}

fn validate_initiate_request(request: &InitiatePaymentRequest) -> Option<String> {
    if request.amount < MIN_AMOUNT {
        return Some(format!("amount must be >= {MIN_AMOUNT}"));
    }
    if request.currency.len() != 3 || !request.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Some("currency must be a 3-letter ISO-4217 code".to_string());
    }
    if let Some(key) = &request.idempotency_key {
        if !(10..=255).contains(&key.len()) {
            return Some("idempotency_key must be 10..255 characters".to_string());
        }
    }
    None
}

fn validate_refund(payment: &Payment, amount: Option<Decimal>) -> Result<(), String> {
    if payment.status != PaymentStatus::Success {
        return Err(format!("cannot refund payment in status {:?}", payment.status));
    }
    let refund_amount = amount.unwrap_or(payment.amount);
    if refund_amount > payment.amount {
        return Err("refund amount exceeds charged amount".to_string());
    }
    if transition_to(PaymentStatus::Success, PaymentStatus::Refunded).is_err() {
        return Err("illegal transition to REFUNDED".to_string());
    }
    Ok(())
}

/// Errors raised while initiating a payment under the booking lock.
#[derive(Debug, thiserror::Error)]
enum InitiatePaymentError {
    /// The lock itself could not be acquired or released.
    #[error(transparent)]
    Lock(#[from] routefare_domain::LockError),
    /// A business-level failure inside the critical section (an active
    /// payment already exists for this booking).
    #[error("{0}")]
    Business(String),
}

async fn initiate_payment_outcome(
    request: InitiatePaymentRequest,
    projection: Arc<dyn PaymentProjectionQuery>,
    gateway: Arc<dyn PaymentGateway>,
    lock: Arc<DistributedLock>,
    idempotency: Arc<RedisIdempotencyStore>,
    clock: Arc<dyn Clock>,
) -> PaymentAction {
    let payment_id = if let Some(key) = &request.idempotency_key {
        match idempotency
            .register_or_get(key, PaymentId::new(), IDEMPOTENCY_TTL)
            .await
        {
            Ok(reg) if reg.first => reg.stored,
            Ok(reg) => {
                let loaded = projection.load_payment(reg.stored).await.unwrap_or(None);
                return PaymentAction::PaymentReplayed {
                    payment_id: reg.stored,
                    payment: loaded.map(Box::new),
                };
            }
            Err(error) => {
                return PaymentAction::ValidationFailed {
                    error: format!("idempotency store error: {error}"),
                };
            }
        }
    } else {
        PaymentId::new()
    };

    let lock_key = booking_lock_key(request.booking_id);
    let booking_id = request.booking_id;
    let idempotency_key = request.idempotency_key.clone();
    let idempotency_key_for_payment = idempotency_key.clone();

    let result: Result<Payment, InitiatePaymentError> = lock
        .execute_with_lock(&lock_key, LOCK_WAIT, LOCK_LEASE, move || async move {
            match projection.load_payment_for_booking(booking_id).await {
                Ok(Some(existing)) => {
                    return Err(InitiatePaymentError::Business(format!(
                        "booking {booking_id} already has an active payment {}",
                        existing.id
                    )));
                }
                Ok(None) => {}
                Err(error) => {
                    return Err(InitiatePaymentError::Business(format!(
                        "failed to check existing payment: {error}"
                    )));
                }
            }

            let now = clock.now();
            let gateway_reference = format!("gw_{}", uuid::Uuid::new_v4());
            let mut payment = Payment {
                id: payment_id,
                booking_id,
                amount: request.amount,
                currency: request.currency.clone(),
                customer_email: request.customer_email.clone(),
                customer_name: request.customer_name.clone(),
                status: PaymentStatus::Initiated,
                gateway_reference: gateway_reference.clone(),
                checkout_url: None,
                transaction_id: None,
                idempotency_key: idempotency_key_for_payment,
                expires_at: Some(now + chrono::Duration::from_std(PAYMENT_EXPIRY).unwrap_or_default()),
                completed_at: None,
                failure_reason: None,
                refund_amount: None,
                refund_reason: None,
                refunded_at: None,
                created_at: now,
            };

            match gateway
                .initialize_charge(&gateway_reference, request.amount, &request.currency)
                .await
            {
                Ok(handle) => {
                    transition_to(payment.status, PaymentStatus::Pending)
                        .map_err(|e| InitiatePaymentError::Business(e.to_string()))?;
                    payment.status = PaymentStatus::Pending;
                    payment.checkout_url = Some(handle.checkout_url);
                }
                Err(error) => {
                    payment.status = PaymentStatus::Failed;
                    payment.failure_reason = Some(error.to_string());
                }
            }

            Ok(payment)
        })
        .await;

    match result {
        Ok(payment) => PaymentAction::PaymentInitiated {
            payment: Box::new(payment),
        },
        Err(reason) => PaymentAction::PaymentRejected {
            idempotency_key,
            reason: reason.to_string(),
        },
    }
}

async fn process_webhook_outcome(
    payload: WebhookPayload,
    projection: Arc<dyn PaymentProjectionQuery>,
    idempotency: Arc<RedisIdempotencyStore>,
    clock: Arc<dyn Clock>,
    booking_client: Arc<dyn BookingClient>,
) -> PaymentAction {
    let webhook_key = format!("webhook:{}:{:?}", payload.gateway_reference, payload.event_type);
    match idempotency.register_or_get(&webhook_key, true, WEBHOOK_TTL).await {
        Ok(reg) if !reg.first => {
            return PaymentAction::WebhookDuplicate {
                gateway_reference: payload.gateway_reference,
            };
        }
        Ok(_) => {}
        Err(error) => {
            return PaymentAction::ValidationFailed {
                error: format!("idempotency store error: {error}"),
            };
        }
    }

    let payment = match projection.load_payment_by_reference(&payload.gateway_reference).await {
        Ok(Some(payment)) => payment,
        Ok(None) => {
            return PaymentAction::ValidationFailed {
                error: format!("no payment found for gateway reference {}", payload.gateway_reference),
            };
        }
        Err(error) => {
            return PaymentAction::ValidationFailed {
                error: format!("failed to load payment for webhook: {error}"),
            };
        }
    };

    let now = clock.now();

    match payload.event_type {
        GatewayEventType::ChargeSuccess => {
            confirm_booking_with_retry(booking_client.as_ref(), payment.booking_id, payment.id).await;
            PaymentAction::PaymentSucceeded {
                payment_id: payment.id,
                transaction_id: payload.transaction_id.unwrap_or_else(|| "unknown".to_string()),
                completed_at: now,
            }
        }
        GatewayEventType::ChargeFailed => {
            cancel_booking_with_retry(
                booking_client.as_ref(),
                payment.booking_id,
                "payment failed",
            )
            .await;
            PaymentAction::PaymentFailed {
                payment_id: payment.id,
                reason: payload.failure_reason.unwrap_or_else(|| "charge failed".to_string()),
                failed_at: now,
            }
        }
    }
}

async fn verify_payment_outcome(
    payment_id: PaymentId,
    gateway_reference: String,
    local_status: PaymentStatus,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
) -> Option<PaymentAction> {
    let gateway_status = match gateway.query_charge(&gateway_reference).await {
        Ok(status) => status,
        Err(error) => {
            return Some(PaymentAction::ValidationFailed {
                error: format!("gateway query failed: {error}"),
            })
        }
    };

    match (gateway_status, local_status) {
        (GatewayChargeStatus::Succeeded, PaymentStatus::Success) => None,
        (GatewayChargeStatus::Succeeded, _) => {
            if local_status.can_transition_to(PaymentStatus::Success) {
                Some(PaymentAction::PaymentSucceeded {
                    payment_id,
                    transaction_id: format!("reconciled_{}", uuid::Uuid::new_v4()),
                    completed_at: clock.now(),
                })
            } else {
                tracing::warn!(
                    %payment_id, ?local_status,
                    "gateway reports charge succeeded but local state cannot reconcile to SUCCESS; ignoring"
                );
                None
            }
        }
        (GatewayChargeStatus::Failed, PaymentStatus::Failed) => None,
        (GatewayChargeStatus::Failed, _) => {
            if local_status.can_transition_to(PaymentStatus::Failed) {
                Some(PaymentAction::PaymentFailed {
                    payment_id,
                    reason: "gateway reports charge failed".to_string(),
                    failed_at: clock.now(),
                })
            } else {
                tracing::warn!(
                    %payment_id, ?local_status,
                    "gateway reports charge failed but local state cannot reconcile to FAILED; ignoring"
                );
                None
            }
        }
        (GatewayChargeStatus::Pending, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_amount_below_minimum() {
        let request = InitiatePaymentRequest {
            booking_id: BookingId::new(),
            amount: Decimal::new(0, 2),
            currency: "USD".to_string(),
            customer_email: "rider@example.com".to_string(),
            customer_name: "Rider".to_string(),
            idempotency_key: None,
        };
        assert!(validate_initiate_request(&request).is_some());
    }

    #[test]
    fn rejects_non_iso_currency() {
        let request = InitiatePaymentRequest {
            booking_id: BookingId::new(),
            amount: Decimal::new(1000, 2),
            currency: "usd".to_string(),
            customer_email: "rider@example.com".to_string(),
            customer_name: "Rider".to_string(),
            idempotency_key: None,
        };
        assert!(validate_initiate_request(&request).is_some());
    }

    fn sample_payment(status: PaymentStatus, amount: Decimal) -> Payment {
        Payment {
            id: PaymentId::new(),
            booking_id: BookingId::new(),
            amount,
            currency: "USD".to_string(),
            customer_email: "rider@example.com".to_string(),
            customer_name: "Rider".to_string(),
            status,
            gateway_reference: "gw_1".to_string(),
            checkout_url: None,
            transaction_id: None,
            idempotency_key: None,
            expires_at: None,
            completed_at: None,
            failure_reason: None,
            refund_amount: None,
            refund_reason: None,
            refunded_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn refund_rejects_uncaptured_payment() {
        let payment = sample_payment(PaymentStatus::Initiated, Decimal::new(10000, 2));
        assert!(validate_refund(&payment, None).is_err());
    }

    #[test]
    fn refund_rejects_amount_above_charged() {
        let payment = sample_payment(PaymentStatus::Success, Decimal::new(10000, 2));
        assert!(validate_refund(&payment, Some(Decimal::new(20000, 2))).is_err());
    }

    #[test]
    fn refund_accepts_partial_amount_on_successful_payment() {
        let payment = sample_payment(PaymentStatus::Success, Decimal::new(10000, 2));
        assert!(validate_refund(&payment, Some(Decimal::new(5000, 2))).is_ok());
    }

    #[test]
    fn refund_rejects_already_refunded_payment() {
        let payment = sample_payment(PaymentStatus::Refunded, Decimal::new(10000, 2));
        assert!(validate_refund(&payment, None).is_err());
    }

    #[test]
    fn payment_failed_records_error() {
        let mut state = PaymentState::new();
        let payment_id = PaymentId::new();
        let event = PaymentAction::PaymentFailed {
            payment_id,
            reason: "card declined".to_string(),
            failed_at: Utc::now(),
        };
        PaymentReducer::apply_event(&mut state, &event);
        assert_eq!(state.last_error.as_deref(), Some("card declined"));
    }

    #[test]
    fn apply_event_ignores_success_replayed_onto_terminal_payment() {
        let mut state = PaymentState::new();
        let payment_id = PaymentId::new();
        let mut payment = sample_payment(PaymentStatus::Refunded, Decimal::new(10000, 2));
        payment.id = payment_id;
        state.payments.insert(payment_id, payment);
        state.loaded.insert(payment_id);

        PaymentReducer::apply_event(
            &mut state,
            &PaymentAction::PaymentSucceeded {
                payment_id,
                transaction_id: "tx_late".to_string(),
                completed_at: Utc::now(),
            },
        );

        assert_eq!(state.get(&payment_id).unwrap().status, PaymentStatus::Refunded);
    }

    #[test]
    fn apply_event_ignores_failed_replayed_onto_successful_payment() {
        let mut state = PaymentState::new();
        let payment_id = PaymentId::new();
        let mut payment = sample_payment(PaymentStatus::Success, Decimal::new(10000, 2));
        payment.id = payment_id;
        state.payments.insert(payment_id, payment);
        state.loaded.insert(payment_id);

        PaymentReducer::apply_event(
            &mut state,
            &PaymentAction::PaymentFailed {
                payment_id,
                reason: "duplicate charge.failed webhook".to_string(),
                failed_at: Utc::now(),
            },
        );

        assert_eq!(state.get(&payment_id).unwrap().status, PaymentStatus::Success);
    }

    struct StubGateway(GatewayChargeStatus);

    #[async_trait::async_trait]
    impl PaymentGateway for StubGateway {
        async fn initialize_charge(
            &self,
            _gateway_reference: &str,
            _amount: Decimal,
            _currency: &str,
        ) -> Result<crate::gateway::ChargeHandle, crate::gateway::GatewayError> {
            unreachable!("not exercised by verify_payment_outcome tests")
        }

        async fn query_charge(
            &self,
            _gateway_reference: &str,
        ) -> Result<GatewayChargeStatus, crate::gateway::GatewayError> {
            Ok(self.0)
        }

        async fn list_transactions_for_date(
            &self,
            _date: chrono::NaiveDate,
        ) -> Result<Vec<crate::gateway::GatewayTransaction>, crate::gateway::GatewayError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn verify_payment_refuses_to_reconcile_terminal_failed_back_to_success() {
        let payment_id = PaymentId::new();
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(StubGateway(GatewayChargeStatus::Succeeded));
        let clock: Arc<dyn Clock> = Arc::new(routefare_core::environment::SystemClock);

        let outcome = verify_payment_outcome(
            payment_id,
            "gw_1".to_string(),
            PaymentStatus::Failed,
            gateway,
            clock,
        )
        .await;

        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn verify_payment_reconciles_pending_to_success() {
        let payment_id = PaymentId::new();
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(StubGateway(GatewayChargeStatus::Succeeded));
        let clock: Arc<dyn Clock> = Arc::new(routefare_core::environment::SystemClock);

        let outcome = verify_payment_outcome(
            payment_id,
            "gw_1".to_string(),
            PaymentStatus::Pending,
            gateway,
            clock,
        )
        .await;

        assert!(matches!(outcome, Some(PaymentAction::PaymentSucceeded { .. })));
    }
}

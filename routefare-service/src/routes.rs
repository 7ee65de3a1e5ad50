//! Router configuration for the Routefare API (spec §6), built the way
//! `examples/ticketing/src/server/routes.rs` assembles its `Router`: one
//! flat table of routes nested under a versioned prefix, health checks
//! outside authentication and rate limiting.

use axum::routing::{get, post};
use axum::Router;
use routefare_web::handlers::health::health_check;
use routefare_web::{correlation_id_layer, RateLimitLayer, RateLimiterState};

use crate::handlers::{audit, booking, matchmaking, payment, ticketing};
use crate::state::AppState;

/// Build the complete Axum router: health checks unauthenticated, every
/// `/v1/...` endpoint behind the correlation-id and rate-limit layers spec
/// §6 asks for (bearer-token verification itself happens per-handler via
/// the `AuthContext` extractor).
pub fn build_router(state: AppState) -> Router {
    let booking_routes = Router::new()
        .route("/bookings", post(booking::create_booking).get(booking::list_bookings))
        .route("/bookings/upcoming", get(booking::list_upcoming_bookings))
        .route("/bookings/reference/:reference", get(booking::get_booking_by_reference))
        .route("/bookings/:id", get(booking::get_booking))
        .route("/bookings/:id/confirm", post(booking::confirm_booking))
        .route("/bookings/:id/cancel", post(booking::cancel_booking));

    let payment_routes = Router::new()
        .route("/payments/initiate", post(payment::initiate_payment))
        .route("/payments/my-payments", get(payment::my_payments))
        .route("/payments/booking/:booking_id", get(payment::get_payment_by_booking))
        .route("/payments/:id", get(payment::get_payment))
        .route("/payments/:id/verify", post(payment::verify_payment))
        .route("/admin/payments", get(payment::list_payments))
        .route("/admin/payments/expire", post(payment::expire_payments))
        .route("/admin/payments/:id/refund", post(payment::refund_payment))
        .route("/admin/reconciliation/run", post(payment::run_reconciliation))
        .route("/admin/reconciliation", get(payment::list_reconciliation))
        .route("/admin/reconciliation/discrepancies", get(payment::list_discrepancies))
        .route("/webhooks/gateway", post(payment::payment_webhook));

    let audit_routes = Router::new().route("/admin/audit", get(audit::list_audit_entries));

    let matchmaking_routes = Router::new().route("/match", post(matchmaking::find_matches));

    let ticketing_routes = Router::new()
        .route("/tickets/generate", post(ticketing::generate_ticket))
        .route("/tickets/verify", post(ticketing::verify_ticket_handler))
        .route("/tickets/:id", get(ticketing::get_ticket))
        .route("/tickets/:id/cancel", post(ticketing::cancel_ticket))
        .route("/tickets/:id/merkle-proof", get(ticketing::get_merkle_proof));

    let v1 =
        booking_routes.merge(payment_routes).merge(matchmaking_routes).merge(ticketing_routes).merge(audit_routes);

    let rate_limit = RateLimitLayer::new(RateLimiterState::new(state.jwt_verifier.clone()));

    Router::new()
        .route("/healthz", get(health_check))
        .nest("/v1", v1.layer(rate_limit))
        .layer(correlation_id_layer())
        .with_state(state)
}

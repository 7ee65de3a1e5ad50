//! Shared application state (spec §10): one long-lived [`Store`] per core,
//! plus the concrete adapters and matchmaking/ticketing dependencies every
//! handler needs.

use std::sync::Arc;

use routefare_auth::JwtVerifier;
use routefare_booking::{BookingAction, BookingEnvironment, BookingReducer, BookingState};
use routefare_domain::lock::DistributedLock;
use routefare_domain::AuditLog;
use routefare_matchmaking::{MatchCache, RouteCandidateQuery, WeightSet};
use routefare_payment::{PaymentAction, PaymentEnvironment, PaymentGateway, PaymentProjectionQuery, PaymentReducer, PaymentState};
use routefare_runtime::Store;
use routefare_ticketing::anchor::AnchorSubmitter;
use routefare_ticketing::batcher::MerkleBatcher;
use routefare_ticketing::signing::TicketSigner;
use routefare_ticketing::ticketing::{TicketStore, VerificationLogSink};
use routefare_web::auth_extractor::HasJwtVerifier;

use crate::adapters::booking_projection::PostgresBookingProjection;
use crate::adapters::payment_projection::PostgresPaymentProjection;
use crate::adapters::ticket_store::PostgresTicketStore;
use crate::config::Config;

/// Booking core's store type, spelled out once so adapters and handlers
/// don't repeat the four type parameters.
pub type BookingStore = Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>;
/// Payment core's store type.
pub type PaymentStore = Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>;

/// Everything a handler needs, shared across the whole process.
#[derive(Clone)]
pub struct AppState {
    /// The single booking store for this process.
    pub booking_store: Arc<BookingStore>,
    /// The single payment store for this process.
    pub payment_store: Arc<PaymentStore>,
    /// Booking read model. A concrete type (not the injected trait object
    /// the reducer's environment holds) so handlers can reach the extra
    /// reads — pagination, by-reference lookup — the trait doesn't expose.
    pub booking_projection: Arc<PostgresBookingProjection>,
    /// Payment read model, same rationale as `booking_projection`.
    pub payment_projection: Arc<PostgresPaymentProjection>,
    /// The same payment read model, as the trait object the reconciliation
    /// job and reducer environment expect.
    pub payment_projection_query: Arc<dyn PaymentProjectionQuery>,
    /// The same charge gateway the payment core's effects use, for the
    /// admin-triggered reconciliation run.
    pub payment_gateway: Arc<dyn PaymentGateway>,
    /// Stage-1 geospatial prefilter for `findMatches`.
    pub route_candidate_query: Arc<dyn RouteCandidateQuery>,
    /// Short-lived per-query match result cache.
    pub match_cache: Arc<dyn MatchCache>,
    /// Default scoring weights, overridable per request.
    pub default_weights: WeightSet,
    /// Signs newly-issued tickets.
    pub ticket_signer: Arc<TicketSigner>,
    /// Accumulates tickets into sealable Merkle batches.
    pub ticket_batcher: Arc<MerkleBatcher>,
    /// Submits batch roots to the configured anchor chain.
    pub anchor_submitter: Arc<dyn AnchorSubmitter>,
    /// Ticket/batch/proof storage.
    pub ticket_store: Arc<dyn TicketStore>,
    /// The same store, concrete, for the scheduler's `list_batches_by_status`
    /// (not part of the `TicketStore` trait since nothing else needs it).
    pub ticket_store_postgres: Arc<PostgresTicketStore>,
    /// Append-only ticket verification log.
    pub verification_log: Arc<dyn VerificationLogSink>,
    /// Inbound bearer token verification.
    pub jwt_verifier: Arc<JwtVerifier>,
    /// The same distributed lock the reducers use (spec §4.A), for the
    /// scheduler's singleton jobs.
    pub lock: Arc<DistributedLock>,
    /// Loaded configuration, for handlers that need e.g. grace windows.
    pub config: Arc<Config>,
    /// Append-only audit log (spec §4.K), for the admin audit-trail read
    /// surface.
    pub audit_log: Arc<dyn AuditLog>,
}

impl HasJwtVerifier for AppState {
    fn jwt_verifier(&self) -> &JwtVerifier {
        &self.jwt_verifier
    }
}

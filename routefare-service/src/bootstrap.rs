//! Process startup: load configuration, build every adapter, and wire the
//! two long-lived [`Store`]s that back the whole HTTP API, the way
//! `examples/ticketing/src/bootstrap/builder.rs`'s `ApplicationBuilder`
//! assembles its dependencies before serving traffic.

use std::sync::Arc;

use routefare_auth::JwtVerifier;
use routefare_booking::{BookingEnvironment, BookingReducer, BookingState};
use routefare_core::environment::SystemClock;
use routefare_core::stream::StreamId;
use routefare_domain::idempotency::RedisIdempotencyStore;
use routefare_domain::lock::DistributedLock;
use routefare_matchmaking::{MokaMatchCache, PostgresRouteCandidateQuery, WeightSet};
use routefare_payment::{PaymentEnvironment, PaymentReducer, PaymentState};
use routefare_postgres::PostgresEventStore;
use routefare_redpanda::RedpandaEventBus;
use routefare_runtime::Store;
use routefare_ticketing::anchor::HttpAnchorSubmitter;
use routefare_ticketing::batcher::MerkleBatcher;
use routefare_ticketing::signing::TicketSigner;
use sqlx::postgres::PgPoolOptions;

use crate::adapters::audit_log::PostgresAuditLog;
use crate::adapters::booking_client::InProcessBookingClient;
use crate::adapters::booking_projection::PostgresBookingProjection;
use crate::adapters::payment_gateway::HttpPaymentGateway;
use crate::adapters::payment_projection::PostgresPaymentProjection;
use crate::adapters::route_query::PostgresRouteQuery;
use crate::adapters::ticket_store::{PostgresTicketStore, PostgresVerificationLogSink};
use crate::config::Config;
use crate::state::AppState;

/// Errors raised while assembling the process's dependencies.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The `PostgreSQL` pool could not be established.
    #[error("postgres pool: {0}")]
    Postgres(#[from] sqlx::Error),
    /// The Redpanda producer/consumer could not be built.
    #[error("event bus: {0}")]
    EventBus(String),
    /// A Redis-backed service (lock, idempotency, seat holds) could not be built.
    #[error("redis-backed dependency: {0}")]
    Redis(String),
    /// The ticketing signing key was malformed.
    #[error("ticket signer: {0}")]
    Signing(String),
}

/// Build the process-wide [`AppState`] — one [`PgPool`](sqlx::PgPool), one
/// Redpanda event bus, one booking [`Store`], one payment [`Store`] — from
/// `config`.
///
/// # Errors
///
/// Returns [`BootstrapError`] if any backing connection (Postgres, Redis,
/// Redpanda) cannot be established, or the configured signing key is
/// malformed.
pub async fn build_app_state(config: Config) -> Result<AppState, BootstrapError> {
    let config = Arc::new(config);

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let event_store = Arc::new(PostgresEventStore::from_pool(pool.clone()));
    let clock = Arc::new(SystemClock);

    let booking_event_bus = Arc::new(
        RedpandaEventBus::builder()
            .brokers(config.redpanda.brokers.clone())
            .producer_acks(config.redpanda.producer_acks.clone())
            .build()
            .map_err(|e| BootstrapError::EventBus(e.to_string()))?,
    );
    let payment_event_bus = Arc::new(
        RedpandaEventBus::builder()
            .brokers(config.redpanda.brokers.clone())
            .producer_acks(config.redpanda.producer_acks.clone())
            .build()
            .map_err(|e| BootstrapError::EventBus(e.to_string()))?,
    );

    let lock = Arc::new(DistributedLock::new(&config.redis.url).map_err(|e| BootstrapError::Redis(e.to_string()))?);
    let idempotency =
        Arc::new(RedisIdempotencyStore::new(&config.redis.url).map_err(|e| BootstrapError::Redis(e.to_string()))?);
    let inventory = Arc::new(
        routefare_booking::inventory::SeatAvailability::new(&config.redis.url)
            .map_err(|e| BootstrapError::Redis(e.to_string()))?,
    );

    let booking_projection = Arc::new(PostgresBookingProjection::new(pool.clone()));
    let payment_projection = Arc::new(PostgresPaymentProjection::new(pool.clone()));
    let route_query = Arc::new(PostgresRouteQuery::new(pool.clone()));
    let audit_log: Arc<dyn routefare_domain::AuditLog> = Arc::new(PostgresAuditLog::new(pool.clone()));

    let booking_environment = BookingEnvironment {
        clock: clock.clone(),
        event_store: event_store.clone(),
        event_bus: booking_event_bus,
        stream_id: StreamId::new(config.topics.booking.clone()),
        projection: booking_projection.clone(),
        route_validation: route_query.clone(),
        confirmed_seats: route_query.clone(),
        inventory,
        lock: lock.clone(),
        idempotency: idempotency.clone(),
        refund_policy: config.refund_policy,
        audit_log: audit_log.clone(),
    };
    let booking_store = Arc::new(Store::new(BookingState::new(), BookingReducer, booking_environment));

    let booking_client = Arc::new(InProcessBookingClient::new(booking_store.clone(), booking_projection.clone()));
    let payment_gateway = Arc::new(HttpPaymentGateway::new(config.webhook.gateway_base_url.clone()));

    let payment_environment = PaymentEnvironment {
        clock,
        event_store,
        event_bus: payment_event_bus,
        stream_id: StreamId::new(config.topics.payment.clone()),
        projection: payment_projection.clone(),
        gateway: payment_gateway.clone(),
        booking_client,
        lock: lock.clone(),
        idempotency,
        audit_log: audit_log.clone(),
    };
    let payment_store = Arc::new(Store::new(PaymentState::new(), PaymentReducer, payment_environment));

    let signing_key_bytes =
        hex::decode(&config.ticketing.signing_key_hex).map_err(|e| BootstrapError::Signing(e.to_string()))?;
    let ticket_signer =
        Arc::new(TicketSigner::from_bytes(&signing_key_bytes).map_err(|e| BootstrapError::Signing(e.to_string()))?);
    let ticket_store_postgres = Arc::new(PostgresTicketStore::new(pool.clone()));

    Ok(AppState {
        booking_store,
        payment_store,
        booking_projection,
        payment_projection: payment_projection.clone(),
        payment_projection_query: payment_projection,
        payment_gateway,
        route_candidate_query: Arc::new(PostgresRouteCandidateQuery::new(pool.clone())),
        match_cache: Arc::new(MokaMatchCache::new(config.matchmaking.cache_capacity)),
        default_weights: WeightSet::DEFAULT,
        ticket_signer,
        ticket_batcher: Arc::new(MerkleBatcher::new()),
        anchor_submitter: Arc::new(HttpAnchorSubmitter::new(config.ticketing.anchor_rpc_url.clone())),
        ticket_store: ticket_store_postgres.clone(),
        ticket_store_postgres,
        verification_log: Arc::new(PostgresVerificationLogSink::new(pool)),
        jwt_verifier: Arc::new(JwtVerifier::from_hmac_secret(config.auth.jwt_hmac_secret.as_bytes())),
        lock,
        config,
        audit_log,
    })
}

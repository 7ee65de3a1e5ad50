//! Routefare HTTP API entry point: load configuration, assemble
//! [`AppState`], run migrations, start the scheduler, and serve traffic on
//! two listeners — the API itself and a separate Prometheus metrics
//! endpoint — until `Ctrl-C`, the way
//! `examples/production-agent/src/main.rs` boots its own two-listener
//! process.

mod adapters;
mod bootstrap;
mod config;
mod handlers;
mod routes;
mod scheduler;
mod state;

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;
use scheduler::Scheduler;
use state::AppState;

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("routefare_service={log_level},routefare_booking={log_level},routefare_payment={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    init_tracing(&config.server.log_level);

    info!("starting routefare-service");

    let prometheus_handle = PrometheusBuilder::new().install_recorder().expect("failed to install Prometheus recorder");

    let state = bootstrap::build_app_state(config).await?;
    let config = state.config.clone();

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    Scheduler::new(&state).run(state.clone(), shutdown_rx);

    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API listening");

    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = api_shutdown.recv().await;
            })
            .await
    });

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    let metrics_app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    info!(%metrics_addr, "metrics listening");

    let mut metrics_shutdown = shutdown_tx.subscribe();
    let metrics_handle = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown.recv().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    if tokio::time::timeout(shutdown_timeout, async {
        let _ = api_handle.await;
        let _ = metrics_handle.await;
    })
    .await
    .is_err()
    {
        error!("graceful shutdown timed out after {shutdown_timeout:?}");
    }

    info!("shutdown complete");
    Ok(())
}

//! Registration service entrypoint.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod state;
#[cfg(test)]
mod testutil;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omnissm=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::from_env()?;
    let bind_address = server_config.bind_address;
    info!(%bind_address, "starting omnissm server");

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(&server_config, shutdown.clone())?);

    spawn_background_loops(Arc::clone(&state), &server_config, shutdown.clone());

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(%bind_address, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health::health_check))
        .route(
            "/register",
            post(api::register::create).patch(api::register::update),
        )
        .route("/events", post(api::events::ingest))
        .route("/reconcile", post(api::reconcile::trigger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodic work: draining the overflow queue and repairing drift.
fn spawn_background_loops(state: Arc<AppState>, config: &ServerConfig, shutdown: CancellationToken) {
    if let Some(drainer) = state.drainer.clone() {
        let period = Duration::from_secs(config.drain_interval_secs.max(1));
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = drainer.run_once(10).await {
                            warn!(%err, "overflow queue drain failed");
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }

    if config.reconcile_interval_secs > 0 {
        let reconciler = Arc::clone(&state.reconciler);
        let period = Duration::from_secs(config.reconcile_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it so startup is
            // not dominated by a full scan.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = reconciler.run().await {
                            warn!(%err, "reconciliation pass failed");
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("graceful shutdown initiated");
    shutdown.cancel();
}

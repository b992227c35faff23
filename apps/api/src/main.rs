mod backend;
mod config;
mod errors;
mod labels;
mod listing;
mod models;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::{HttpTransport, LogAuthObserver};
use crate::config::Config;
use crate::listing::ViewRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ATS views v{}", env!("CARGO_PKG_VERSION"));

    // Upstream transport
    let transport = HttpTransport::new(
        &config.backend_url,
        config.backend_token.clone(),
        Duration::from_secs(config.request_timeout_secs),
        Arc::new(LogAuthObserver),
    )?;
    if !transport.has_token() {
        info!("No BACKEND_TOKEN set; upstream requests are sent unauthenticated");
    }
    info!("Backend transport initialized ({})", config.backend_url);

    let views = Arc::new(ViewRegistry::new(
        Arc::new(transport),
        config.default_page_size,
    ));

    let state = AppState {
        config: config.clone(),
        views: views.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(views))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C; loads still in flight are discarded.
async fn shutdown_signal(views: Arc<ViewRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    views.close_all();
}

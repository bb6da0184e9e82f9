use crate::config::Config;
use crate::state::CacheIndex;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_dash;
pub mod routes_files;

/// Shared application context handed to every route.
#[derive(Clone)]
pub struct AppContext {
    pub cache_index: Arc<CacheIndex>,
    pub config: Arc<Config>,
}

/// Builds the router: `/files*` and `/dash/*` routes, CORS, request tracing,
/// and a static-UI fallback for everything else.
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let interface_dir = ctx.config.interface_dir.clone();

    let app = Router::new()
        .merge(routes_files::routes())
        .merge(routes_dash::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if interface_dir.exists() {
        tracing::info!(?interface_dir, "serving static UI assets");
        let index_path = interface_dir.join("index.html");
        app.fallback_service(
            ServeDir::new(&interface_dir)
                .append_index_html_on_directories(true)
                .not_found_service(ServeFile::new(index_path)),
        )
    } else {
        app
    }
}

/// Starts the HTTP server and blocks until a shutdown signal is received.
pub async fn start_server(config: Config, cache_index: Arc<CacheIndex>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let ctx = AppContext {
        cache_index,
        config: Arc::new(config),
    };

    let app = create_router(ctx);

    tracing::info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::config::{ServerConfig, TunnelWatchConfig};
use crate::store::{self, Stores};
use crate::traffic::{InMemoryCooldown, ReportIngestCoordinator};

/// Open the configured store, seed the default tunnel and wire the coordinator
pub async fn build_state(config: &TunnelWatchConfig) -> Result<Arc<AppState>> {
    let stores = Stores::from_config(&config.store)?;

    let tunnel = config.tunnel.to_tunnel(chrono::Utc::now())?;
    store::seed_tunnel(stores.tunnels.as_ref(), tunnel).await?;

    let mut coordinator = ReportIngestCoordinator::new(stores)
        .with_geofence(config.geofence.verifier()?)
        .with_scorer(config.scoring.scorer()?)
        .with_window(config.scoring.window());
    if config.cooldown.enabled {
        tracing::info!("Submission cooldown of {} minutes enabled", config.cooldown.minutes);
        coordinator =
            coordinator.with_cooldown(Arc::new(InMemoryCooldown::new(config.cooldown.duration())));
    }

    Ok(Arc::new(AppState {
        coordinator,
        default_tunnel_id: config.tunnel.id,
    }))
}

/// Full application router with middleware
pub fn app(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new().nest("/api", api::router(state));
    if let Some(static_dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    app.layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_seconds.into(),
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
}

pub async fn run(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let app = app(state, config);
    let addr = config.bind_address();

    if let (Some(cert), Some(key)) = (&config.tls_cert_path, &config.tls_key_path) {
        return run_tls(app, &addr, cert, key).await;
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;
    Ok(())
}

#[cfg(feature = "tls")]
async fn run_tls(app: Router, addr: &str, cert: &str, key: &str) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed, keeping it");
    }

    let tls = RustlsConfig::from_pem_file(cert, key)
        .await
        .with_context(|| format!("Failed to load TLS certificate {cert}"))?;
    let addr: std::net::SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid bind address {addr}"))?;

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    tracing::info!("Web server running at https://{}", addr);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Web server failed")?;
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn run_tls(_app: Router, _addr: &str, _cert: &str, _key: &str) -> Result<()> {
    anyhow::bail!("TLS is configured but this build has no `tls` feature")
}

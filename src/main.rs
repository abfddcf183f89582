//! Lenslog Server - visitor snapshot capture and per-session artifact storage
//!
//! HTTP endpoints:
//! - POST /capture    - persist one submitted snapshot for the calling visitor
//! - GET  /admin/data - aggregated per-visitor listing
//! - GET  /admin      - static admin page
//! - GET  /uploads/*  - raw artifact files

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lenslog::geo::{IpLocator, IpinfoConfig, IpinfoLocator, NullLocator};
use lenslog::{create_router, AppState, ArtifactStore, Config, SessionStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lenslog=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let store = Arc::new(ArtifactStore::new(&config.uploads_dir));
    store
        .ensure_root()
        .await
        .expect("failed to create uploads directory");

    let (locator, geo_enabled): (Arc<dyn IpLocator>, bool) = match &config.ipinfo_token {
        Some(token) => {
            let locator = IpinfoLocator::with_config(IpinfoConfig {
                base_url: config.ipinfo_url.clone(),
                token: token.clone(),
                timeout: Duration::from_secs(config.geo_timeout_secs),
            })
            .expect("failed to build geolocation client");
            (Arc::new(locator), true)
        }
        None => {
            warn!("IPINFO_TOKEN not set; geolocation disabled");
            (Arc::new(NullLocator), false)
        }
    };

    let sessions = Arc::new(SessionStore::new(Arc::clone(&store), locator));
    match sessions.load_existing().await {
        Ok(0) => {}
        Ok(count) => info!(count, "Reloaded visitor sessions from disk"),
        Err(e) => warn!(error = %e, "Failed to reload sessions from disk"),
    }

    let state = AppState {
        sessions,
        store,
        geo_enabled,
    };
    let app = create_router(state, &config);

    let addr = config.socket_addr();
    info!(uploads_dir = %config.uploads_dir.display(), "Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => { info!("Received SIGINT, shutting down"); }
            _ = sigterm.recv() => { info!("Received SIGTERM, shutting down"); }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl-c");
        info!("Received SIGINT, shutting down");
    }
}

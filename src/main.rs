//! webhub - Peace Corps volunteer hub backend
//!
//! Session-authenticated REST API over malaria posts, accounts and the
//! peacetrack project model.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webhub::{api, config, db, AppState, Error, Result};

/// How often expired sessions are purged.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::init();
    tracing::info!(
        "Starting webhub server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize application state
    let state = AppState::new().await?;
    tracing::info!("Application state initialized");

    // Create the bootstrap superuser if configured
    if let Some((username, password)) = config.bootstrap.credentials() {
        let email = config.bootstrap.admin_email.as_deref().unwrap_or_default();
        state.accounts.ensure_superuser(username, password, email).await?;
    }

    api::status::init_startup_time();

    // Purge expired sessions in the background
    let pool = state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match db::cleanup_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Expired sessions purged"),
                Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
            }
        }
    });
    tracing::debug!("Session cleanup task started");

    let app = webhub::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid listen address: {}", e)))?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

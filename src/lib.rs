//! webhub - Peace Corps volunteer hub backend
//!
//! Library exports for testing and external use.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use axum::Router;
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;

/// Build the application router with tracing and CORS layers applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(api::routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// The served application: [`router`] behind trailing-slash trimming, so
/// `/api/posts/1/` and `/api/posts/1` reach the same handler.
///
/// Trimming has to happen before routing, which a layer on the routed
/// router cannot do, so the normalised service is mounted as the fallback
/// of an otherwise empty router.
pub fn app(state: AppState) -> Router {
    let normalized = NormalizePathLayer::trim_trailing_slash().layer(router(state));
    Router::new().fallback_service(normalized)
}

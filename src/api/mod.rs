//! API Routes for webhub
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod accounts;
pub mod extract;
mod malaria;
mod pcuser;
pub mod status;
pub mod viewset;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{Map, Value};

use crate::db::{
    Activity, Cohort, Goal, Indicator, Measurement, Objective, Outcome, Output, Post, Project,
    PtPost, Region, Sector, User, Volunteer,
};
use crate::middleware::require_session;
use crate::AppState;

/// Collections under `/api`, in the order the root lists them.
pub const COLLECTIONS: &[&str] = &[
    "users",
    "posts",
    "regions",
    "sectors",
    "ptposts",
    "projects",
    "goals",
    "objectives",
    "indicators",
    "outputs",
    "outcomes",
    "activity",
    "measurement",
    "cohort",
    "volunteer",
];

/// Build the complete API router.
///
/// Route structure:
/// - /signup_do, /login_do, /logout_do, /verify, ... - Accounts (public)
/// - /profile, /edit_profile, /change_pass, ... - Accounts (session-protected)
/// - /api-auth/login, /api-auth/logout - Browsable API login aliases
/// - /api/* - REST collections (session-protected)
/// - /malaria/* - Post authoring (session-protected)
/// - /pcuser/* - Profile rows (session-protected)
/// - /health, /health/live - Health checks (public)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health endpoints (public)
        .merge(status::routes())
        // Account routes (mixed public/protected)
        .merge(accounts::routes(state.clone()))
        // REST collections
        .nest("/api", rest_routes(state.clone()))
        // Post authoring
        .nest("/malaria", malaria::routes(state.clone()))
        // Pcuser management
        .nest("/pcuser", pcuser::routes(state))
}

/// REST collections behind session authentication.
///
/// The session layer wraps each route's method fallback as well, so an
/// anonymous request is refused with 403 before a 405 could be produced.
/// Paths with no route skip the layer and answer 404.
fn rest_routes(state: AppState) -> Router<AppState> {
    let router = Router::new().route("/", get(api_root));

    let router = viewset::read_only::<User>(router, "users");
    let router = viewset::read_only::<Post>(router, "posts");

    let router = viewset::model::<Region>(router, "regions");
    let router = viewset::model::<Sector>(router, "sectors");
    let router = viewset::model::<PtPost>(router, "ptposts");
    let router = viewset::model::<Project>(router, "projects");
    let router = viewset::model::<Goal>(router, "goals");
    let router = viewset::model::<Objective>(router, "objectives");
    let router = viewset::model::<Indicator>(router, "indicators");
    let router = viewset::model::<Output>(router, "outputs");
    let router = viewset::model::<Outcome>(router, "outcomes");
    let router = viewset::model::<Activity>(router, "activity");
    let router = viewset::model::<Measurement>(router, "measurement");
    let router = viewset::model::<Cohort>(router, "cohort");
    let router = viewset::model::<Volunteer>(router, "volunteer");

    router.route_layer(axum::middleware::from_fn_with_state(state, require_session))
}

/// GET /api - URL of every collection.
async fn api_root(State(state): State<AppState>) -> Json<Value> {
    let links: Map<String, Value> = COLLECTIONS
        .iter()
        .map(|name| {
            (
                name.to_string(),
                Value::String(format!("{}/api/{}", state.api.public_url, name)),
            )
        })
        .collect();
    Json(Value::Object(links))
}

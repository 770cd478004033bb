//! Pcuser Routes
//!
//! Routes:
//! - GET /pcuser - List pcusers
//! - POST /pcuser - Create a pcuser for an existing user (staff only)
//! - GET /pcuser/:id - Get a pcuser
//! - PUT /pcuser/:id - Replace profile fields (the owning user or staff)
//! - DELETE /pcuser/:id - Delete a pcuser (staff only)

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Router,
};

use serde::Deserialize;

use super::extract::Json;
use super::viewset::parse_id;
use crate::db::{self, Pcuser, PcuserProfile};
use crate::middleware::{require_session, SessionUser};
use crate::{AppState, Error, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_pcusers).post(create_pcuser))
        .route(
            "/:id",
            get(get_pcuser).put(update_pcuser).delete(delete_pcuser),
        )
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

#[derive(Debug, Deserialize)]
pub struct CreatePcuserRequest {
    pub user: i64,
    #[serde(flatten)]
    pub profile: PcuserProfile,
}

async fn list_pcusers(State(state): State<AppState>) -> Result<Json<Vec<Pcuser>>> {
    Ok(Json(db::list_pcusers(&state.db).await?))
}

async fn create_pcuser(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreatePcuserRequest>,
) -> Result<(StatusCode, Json<Pcuser>)> {
    user.require_staff()?;

    // Surface a missing user as 400 rather than a bare constraint error
    db::get_user(&state.db, request.user)
        .await
        .map_err(|e| match e {
            Error::NotFound(what) => Error::Validation(format!("{} does not exist", what)),
            other => other,
        })?;

    let pcuser = db::create_pcuser(&state.db, request.user, request.profile).await?;
    tracing::info!(pcuser_id = pcuser.id, by = %user.username, "Created pcuser");
    Ok((StatusCode::CREATED, Json(pcuser)))
}

async fn get_pcuser(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Pcuser>> {
    let id = parse_id(&id, "Pcuser")?;
    db::get_pcuser(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Pcuser {}", id)))
}

async fn update_pcuser(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(profile): Json<PcuserProfile>,
) -> Result<Json<Pcuser>> {
    let id = parse_id(&id, "Pcuser")?;
    let existing = db::get_pcuser(&state.db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Pcuser {}", id)))?;

    if existing.user_id != user.user_id {
        user.require_staff()?;
    }

    db::update_pcuser_profile(&state.db, id, profile)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Pcuser {}", id)))
}

async fn delete_pcuser(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    user.require_staff()?;
    let id = parse_id(&id, "Pcuser")?;

    if !db::delete_pcuser(&state.db, id).await? {
        return Err(Error::NotFound(format!("Pcuser {}", id)));
    }
    tracing::info!(pcuser_id = id, by = %user.username, "Deleted pcuser");
    Ok(StatusCode::NO_CONTENT)
}

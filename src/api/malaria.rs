//! Malaria post authoring routes.
//!
//! The read-only `/api/posts` collection exposes every post; these routes
//! let a pcuser write their own.
//!
//! Routes:
//! - GET /malaria/posts - Posts owned by the current user
//! - POST /malaria/posts - Create a post
//! - GET /malaria/posts/:id - Get a post
//! - PUT /malaria/posts/:id - Edit a post (owner only, records a revision)
//! - DELETE /malaria/posts/:id - Delete a post (owner only)
//! - GET /malaria/posts/:id/revisions - Revisions of a post

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Router,
};

use super::extract::Json;
use super::viewset::parse_id;
use crate::db::{Post, PostContent, RevPost};
use crate::middleware::{require_session, SessionUser};
use crate::{AppState, Error, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_my_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(edit_post).delete(delete_post),
        )
        .route("/posts/:id/revisions", get(list_revisions))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("Post {}", id))
}

async fn list_my_posts(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Post>>> {
    let owner = user.require_pcuser()?;
    Ok(Json(state.malaria.list_posts_by_owner(owner).await?))
}

async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(content): Json<PostContent>,
) -> Result<(StatusCode, Json<Post>)> {
    let owner = user.require_pcuser()?;
    let post = state.malaria.create_post(owner, content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Post>> {
    let id = parse_id(&id, "Post")?;
    state
        .malaria
        .get_post_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn edit_post(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    Json(content): Json<PostContent>,
) -> Result<Json<Post>> {
    let id = parse_id(&id, "Post")?;
    let owner = user.require_pcuser()?;
    state
        .malaria
        .edit_post(owner, id, content)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_post(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "Post")?;
    let owner = user.require_pcuser()?;
    if !state.malaria.delete_owned_post(owner, id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_revisions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RevPost>>> {
    let id = parse_id(&id, "Post")?;
    if state.malaria.get_post_by_id(id).await?.is_none() {
        return Err(not_found(id));
    }
    Ok(Json(state.malaria.get_revposts_of_owner(id).await?))
}

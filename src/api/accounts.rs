//! Account Routes
//!
//! Routes:
//! - POST /signup_do - Register a user and mail a verification token
//! - GET /verify?token= - Confirm an email address
//! - POST /login_do - Open a session (also POST /api-auth/login)
//! - POST /logout_do - End the session (also GET/POST /api-auth/logout)
//! - POST /forgot_pass - Mail a password reset token
//! - POST /reset_pass - Set a new password with a reset token
//! - GET /profile - Current user and profile (session)
//! - POST /edit_profile - Update contact and profile fields (session)
//! - POST /change_pass - Change password (session)
//! - POST /send_email - Contact message to the site inbox (session)
//! - POST /send_verification_email - Re-issue the verification mail (session)

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use super::extract::Json;
use crate::middleware::{require_session, SessionUser, SESSION_COOKIE_NAME};
use crate::services::{Profile, ProfileUpdate, Signup};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup_do", post(signup_do))
        .route("/verify", get(verify))
        .route("/login_do", post(login_do))
        .route("/logout_do", post(logout_do))
        .route("/forgot_pass", post(forgot_pass))
        .route("/reset_pass", post(reset_pass))
        .route("/api-auth/login", post(login_do))
        .route("/api-auth/logout", get(logout_do).post(logout_do));

    let protected = Router::new()
        .route("/profile", get(profile))
        .route("/edit_profile", post(edit_profile))
        .route("/change_pass", post(change_pass))
        .route("/send_email", post(send_email))
        .route("/send_verification_email", post(send_verification_email))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    public.merge(protected)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPassRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPassRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePassRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub subject: String,
    pub message: String,
}

// ============================================================================
// Cookies
// ============================================================================

fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    let max_age = state.accounts.session_max_age().num_seconds();
    Cookie::build((SESSION_COOKIE_NAME, session_id))
        .path("/")
        .http_only(true)
        .secure(state.api.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn cleared_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build()
}

// ============================================================================
// Public Handlers
// ============================================================================

/// Register a new account.
///
/// POST /signup_do
#[axum::debug_handler]
async fn signup_do(
    State(state): State<AppState>,
    Json(form): Json<Signup>,
) -> Result<(StatusCode, Json<Profile>)> {
    let profile = state.accounts.signup(form).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Confirm an email address with the mailed token.
///
/// GET /verify?token=
#[axum::debug_handler]
async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse> {
    let pcuser = state.accounts.verify(&query.token).await?;
    Ok(Json(pcuser))
}

/// Open a session.
///
/// POST /login_do
#[axum::debug_handler]
async fn login_do(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (user, session) = state
        .accounts
        .login(&request.username, &request.password)
        .await?;

    let jar = jar.add(session_cookie(&state, session.id));

    Ok((jar, Json(json!({ "user": user }))))
}

/// End the current session.
///
/// POST /logout_do
///
/// Clears the session cookie and invalidates the session server-side.
/// Succeeds without a session.
#[axum::debug_handler]
async fn logout_do(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state.accounts.logout(cookie.value()).await?;
    }

    let jar = jar.add(cleared_cookie());

    Ok((
        jar,
        Json(json!({
            "message": "Logged out successfully"
        })),
    ))
}

/// Mail a reset token. Answers the same whether or not the email is known.
///
/// POST /forgot_pass
#[axum::debug_handler]
async fn forgot_pass(
    State(state): State<AppState>,
    Json(request): Json<ForgotPassRequest>,
) -> Result<impl IntoResponse> {
    state.accounts.forgot_pass(&request.email).await?;
    Ok(Json(json!({
        "message": "If the address is registered, a reset token has been sent"
    })))
}

/// Set a new password using a reset token.
///
/// POST /reset_pass
#[axum::debug_handler]
async fn reset_pass(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<ResetPassRequest>,
) -> Result<impl IntoResponse> {
    state
        .accounts
        .reset_pass(&request.token, &request.new_password)
        .await?;

    let jar = jar.add(cleared_cookie());

    Ok((jar, Json(json!({ "message": "Password reset" }))))
}

// ============================================================================
// Session Handlers
// ============================================================================

/// GET /profile
#[axum::debug_handler]
async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Profile>> {
    Ok(Json(state.accounts.profile(user.user_id).await?))
}

/// POST /edit_profile
#[axum::debug_handler]
async fn edit_profile(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    Ok(Json(state.accounts.edit_profile(user.user_id, update).await?))
}

/// POST /change_pass
#[axum::debug_handler]
async fn change_pass(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<ChangePassRequest>,
) -> Result<impl IntoResponse> {
    state
        .accounts
        .change_pass(user.user_id, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password changed" })))
}

/// POST /send_email
#[axum::debug_handler]
async fn send_email(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<SendEmailRequest>,
) -> Result<impl IntoResponse> {
    state
        .accounts
        .send_email(user.user_id, &request.subject, &request.message)
        .await?;
    Ok(Json(json!({ "message": "Message sent" })))
}

/// POST /send_verification_email
#[axum::debug_handler]
async fn send_verification_email(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<impl IntoResponse> {
    state.accounts.send_verification_email(user.user_id).await?;
    Ok(Json(json!({ "message": "Verification email sent" })))
}

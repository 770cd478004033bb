//! Session-based authentication middleware.
//!
//! # Session Flow
//!
//! 1. User posts credentials to `/login_do` or `/api-auth/login`
//! 2. Server creates a session and sets the `webhub_session` cookie
//! 3. Subsequent requests include the cookie, validated by this middleware
//! 4. Session expires after the configured duration or on logout
//!
//! Requests without a valid session are answered with 403 and the error
//! code `NOT_AUTHENTICATED`. The check runs before routing inside the
//! protected routers, so an anonymous request never learns whether a
//! method is allowed or an id exists.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::{db, error::Error, AppState};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "webhub_session";

/// User context injected into request extensions after successful session validation.
#[derive(Clone, Debug)]
pub struct SessionUser {
    /// Session the request arrived with
    pub session_id: String,
    pub user_id: i64,
    /// Profile row, absent only for users created outside signup
    pub pcuser_id: Option<i64>,
    pub username: String,
    pub is_staff: bool,
}

impl SessionUser {
    /// Fail with 403 unless the user is staff.
    pub fn require_staff(&self) -> Result<(), Error> {
        if self.is_staff {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// The user's pcuser id, or 403 when they have no profile.
    pub fn require_pcuser(&self) -> Result<i64, Error> {
        self.pcuser_id.ok_or(Error::Forbidden)
    }
}

/// Middleware that requires a valid session.
///
/// Extracts the session id from the cookie, validates it against the
/// database, and injects `SessionUser` into request extensions.
///
/// # Errors
///
/// Returns 403 `NOT_AUTHENTICATED` if:
/// - No session cookie present
/// - Session not found in database
/// - Session is expired
/// - User not found or inactive
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let session_id = jar
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or(Error::NotAuthenticated)?;

    let session_user = validate_session(&state, &session_id).await?;

    req.extensions_mut().insert(session_user);

    Ok(next.run(req).await)
}

/// Validate a session id and return the session user.
pub(crate) async fn validate_session(state: &AppState, session_id: &str) -> Result<SessionUser, Error> {
    let session = db::get_session(&state.db, session_id)
        .await?
        .ok_or(Error::NotAuthenticated)?;

    if session.is_expired() {
        // Clean up expired session
        let pool = state.db.clone();
        let sid = session_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = db::delete_session(&pool, &sid).await {
                tracing::warn!(error = %e, "Failed to delete expired session");
            }
        });
        return Err(Error::NotAuthenticated);
    }

    let user = match db::get_user(&state.db, session.user_id).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(Error::NotFound(_)) => return Err(Error::NotAuthenticated),
        Err(e) => return Err(e),
    };
    let pcuser = db::get_pcuser_by_user(&state.db, user.id).await?;

    // Extend the session once it is more than halfway through its lifetime
    let max_age = state.accounts.session_max_age();
    let halfway = Utc::now() + (max_age / 2);

    if session.expires_at < halfway {
        let new_expires = Utc::now() + max_age;
        let pool = state.db.clone();
        let sid = session_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = db::extend_session(&pool, &sid, new_expires).await {
                tracing::warn!(error = %e, "Failed to extend session");
            }
        });
    }

    Ok(SessionUser {
        session_id: session.id,
        user_id: user.id,
        pcuser_id: pcuser.map(|p| p.id),
        username: user.username,
        is_staff: user.is_staff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_staff: bool, pcuser_id: Option<i64>) -> SessionUser {
        SessionUser {
            session_id: "sid".to_string(),
            user_id: 1,
            pcuser_id,
            username: "alice".to_string(),
            is_staff,
        }
    }

    #[test]
    fn test_require_staff() {
        assert!(user(true, None).require_staff().is_ok());
        assert!(matches!(
            user(false, None).require_staff(),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn test_require_pcuser() {
        assert_eq!(user(false, Some(7)).require_pcuser().unwrap(), 7);
        assert!(user(false, None).require_pcuser().is_err());
    }
}

//! Middleware for webhub.
//!
//! - `session_auth` - Session cookie validation for every protected route

mod session_auth;

pub use session_auth::{require_session, SessionUser, SESSION_COOKIE_NAME};

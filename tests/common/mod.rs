//! Shared setup for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::COOKIE, HeaderValue, Method, Request, Response},
    Router,
};
use axum_test::TestServer;
use tower::ServiceExt;
use webhub::db::{self, CreateUser, DbPool, Pcuser, PcuserProfile, User};
use webhub::middleware::SESSION_COOKIE_NAME;
use webhub::services::{password, MemoryMailer};
use webhub::AppState;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub server: TestServer,
    pub router: Router,
    pub pool: DbPool,
    pub state: AppState,
    pub mailer: MemoryMailer,
}

/// A user with a profile and an open session.
pub struct TestUser {
    pub user: User,
    pub pcuser: Pcuser,
    pub cookie: HeaderValue,
}

/// Create an in-memory database with the schema applied
pub async fn setup_test_db() -> DbPool {
    let pool = db::init_pool(":memory:")
        .await
        .expect("Failed to create test database");
    db::initialize_schema(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

/// Build the full router over a fresh database
pub async fn build_test_app() -> TestApp {
    let pool = setup_test_db().await;
    let mailer = MemoryMailer::new();
    let state = AppState::from_parts(pool.clone(), Arc::new(mailer.clone()), webhub::config());

    let router = webhub::app(state.clone());
    let server = TestServer::new(router.clone()).expect("Failed to create test server");

    TestApp {
        server,
        router,
        pool,
        state,
        mailer,
    }
}

pub fn session_cookie(session_id: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE_NAME, session_id)).unwrap()
}

impl TestApp {
    /// Create a user with a pcuser row and log them in.
    pub async fn create_user(&self, username: &str, is_staff: bool) -> TestUser {
        let user = db::create_user(
            &self.pool,
            CreateUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: password::hash_password(PASSWORD).unwrap(),
                is_staff,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create test user");

        let pcuser = db::create_pcuser(&self.pool, user.id, PcuserProfile::default())
            .await
            .expect("Failed to create test pcuser");

        let session = self
            .state
            .accounts
            .open_session(user.id)
            .await
            .expect("Failed to open session");

        TestUser {
            user,
            pcuser,
            cookie: session_cookie(&session.id),
        }
    }

    /// Send a raw request through the router, for methods and headers the
    /// test server does not cover.
    pub async fn send(&self, method: Method, uri: &str, cookie: Option<&HeaderValue>) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie.clone());
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pull the 32 character token out of a mailed message body.
pub fn token_from_mail(body: &str) -> String {
    body.split(|c: char| c.is_whitespace() || c == '=')
        .filter(|part| part.len() == 32)
        .last()
        .expect("no token in mail")
        .to_string()
}

//! Application state for webhub.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::config::{self, Config};
use crate::db::DbPool;
use crate::services::{AccountService, AccountSettings, LogMailer, MalariaService, Mailer};
use crate::Result;

/// Settings the REST layer reads on every list request.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL for absolute pagination links.
    pub public_url: String,
    /// Rows per page.
    pub page_size: u32,
    /// Whether the session cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Account and session service.
    pub accounts: AccountService,
    /// Malaria post service.
    pub malaria: MalariaService,
    /// REST settings.
    pub api: Arc<ApiSettings>,
}

impl AppState {
    /// Create a new application state from the global configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        // Initialize database
        let db = crate::db::init_pool(&config.database.path).await?;

        // Initialize database schema
        crate::db::initialize_schema(&db).await?;

        Ok(Self::from_parts(db, Arc::new(LogMailer), config))
    }

    /// Assemble state around an existing pool and mailer.
    pub fn from_parts(db: DbPool, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        let accounts = AccountService::new(
            db.clone(),
            mailer,
            AccountSettings {
                session_max_age: chrono::Duration::seconds(config.session.max_age_seconds as i64),
                mail_from: config.mail.from.clone(),
                public_url: config.server.public_url.clone(),
            },
        );
        let malaria = MalariaService::new(db.clone());

        Self {
            db,
            accounts,
            malaria,
            api: Arc::new(ApiSettings {
                public_url: config.server.public_url.clone(),
                page_size: config.api.page_size,
                cookie_secure: config.session.cookie_secure,
            }),
        }
    }
}

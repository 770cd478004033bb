//! Configuration management for webhub.
//!
//! Loads configuration from environment variables (and an optional `.env`
//! file) once at startup.

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

/// Largest page size a client can ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default session lifetime, 14 days.
pub const DEFAULT_SESSION_MAX_AGE: u64 = 14 * 24 * 60 * 60;

/// Longest session lifetime accepted from the environment, one year.
pub const MAX_SESSION_MAX_AGE: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
    pub mail: MailConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used when building absolute pagination links.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_age_seconds: u64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
}

/// Superuser created at startup when both username and password are set.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8000").parse().unwrap_or(8000),
                public_url: env_or("PUBLIC_URL", "http://localhost:8000")
                    .trim_end_matches('/')
                    .to_string(),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/webhub.db"),
            },
            session: SessionConfig {
                max_age_seconds: parse_session_max_age(&env_or("SESSION_MAX_AGE", "")),
                cookie_secure: env_or("SESSION_COOKIE_SECURE", "false")
                    .eq_ignore_ascii_case("true"),
            },
            api: ApiConfig {
                page_size: env_or("API_PAGE_SIZE", "10")
                    .parse::<u32>()
                    .unwrap_or(10)
                    .clamp(1, MAX_PAGE_SIZE),
            },
            mail: MailConfig {
                from: env_or("MAIL_FROM", "noreply@webhub.local"),
            },
            bootstrap: BootstrapConfig {
                admin_username: env::var("ADMIN_USERNAME").ok(),
                admin_password: env::var("ADMIN_PASSWORD").ok(),
                admin_email: env::var("ADMIN_EMAIL").ok(),
            },
        }
    }
}

/// Session lifetime in seconds, kept between one minute and one year.
fn parse_session_max_age(raw: &str) -> u64 {
    raw.trim()
        .parse::<u64>()
        .unwrap_or(DEFAULT_SESSION_MAX_AGE)
        .clamp(60, MAX_SESSION_MAX_AGE)
}

impl BootstrapConfig {
    /// Credentials for the bootstrap superuser, if fully configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

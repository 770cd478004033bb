//! Web session queries.
//!
//! Sessions are stored server-side; the cookie only carries the random id.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::{Error, Result};

/// Web session record.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Create a new session.
pub async fn create_session(pool: &DbPool, input: CreateSession) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_id, created_at, expires_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(input.user_id)
    .bind(Utc::now())
    .bind(input.expires_at)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a session by ID, expired or not.
pub async fn get_session(pool: &DbPool, id: &str) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Push a session's expiry forward.
pub async fn extend_session(pool: &DbPool, id: &str, expires_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(expires_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a session.
pub async fn delete_session(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete all sessions for a user.
/// Uses idx_sessions_user index.
pub async fn delete_user_sessions(pool: &DbPool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete expired sessions.
pub async fn cleanup_expired_sessions(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, init_pool, initialize_schema, CreateUser};

    async fn setup_with_user() -> (DbPool, i64) {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        let user = create_user(
            &pool,
            CreateUser {
                username: "alice".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (pool, user.id)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (pool, user_id) = setup_with_user().await;

        let session = create_session(
            &pool,
            CreateSession {
                id: "session-1".to_string(),
                user_id,
                expires_at: Utc::now() + chrono::Duration::hours(24),
            },
        )
        .await
        .unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(!session.is_expired());

        let fetched = get_session(&pool, "session-1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "session-1");

        delete_session(&pool, "session-1").await.unwrap();
        assert!(get_session(&pool, "session-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_expired() {
        let (pool, user_id) = setup_with_user().await;

        for (id, offset) in [("old", -1), ("fresh", 1)] {
            create_session(
                &pool,
                CreateSession {
                    id: id.to_string(),
                    user_id,
                    expires_at: Utc::now() + chrono::Duration::hours(offset),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(cleanup_expired_sessions(&pool).await.unwrap(), 1);
        assert!(get_session(&pool, "old").await.unwrap().is_none());
        assert!(get_session(&pool, "fresh").await.unwrap().is_some());

        assert_eq!(delete_user_sessions(&pool, user_id).await.unwrap(), 1);
    }
}

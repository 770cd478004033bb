//! User and pcuser database queries.
//!
//! A `User` holds login credentials and flags; a `Pcuser` is the one-to-one
//! profile row that posts, revisions and volunteers reference.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};

use super::resource::Resource;
use super::DbPool;

// ============================================================================
// User Types
// ============================================================================

/// User record from the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Resource for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "User";
    const DESCRIPTION: &'static str = "Registered accounts. Read only.";
}

/// Input for creating a new user.
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Input for updating a user.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// ============================================================================
// Pcuser Types
// ============================================================================

/// Profile record attached to a user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Pcuser {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub verify_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
}

/// Profile fields a user may set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PcuserProfile {
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
}

// ============================================================================
// User Queries
// ============================================================================

/// Create a new user.
pub async fn create_user<'e, E>(executor: E, input: CreateUser) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff, is_superuser, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.password_hash)
    .bind(input.is_staff)
    .bind(input.is_superuser)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
    .map_err(|e| Error::from_write(e, &format!("User '{}'", input.username)))
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

/// Get a user by username.
pub async fn get_user_by_username(pool: &DbPool, username: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Get a user by email.
/// Uses idx_users_email index.
pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? ORDER BY id LIMIT 1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Update a user's contact fields.
pub async fn update_user(pool: &DbPool, id: i64, input: UpdateUser) -> Result<User> {
    let mut updates = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(email) = input.email {
        updates.push("email = ?");
        bindings.push(email);
    }
    if let Some(first_name) = input.first_name {
        updates.push("first_name = ?");
        bindings.push(first_name);
    }
    if let Some(last_name) = input.last_name {
        updates.push("last_name = ?");
        bindings.push(last_name);
    }

    if updates.is_empty() {
        return get_user(pool, id).await;
    }

    let query = format!(
        "UPDATE users SET {} WHERE id = ? RETURNING *",
        updates.join(", ")
    );

    let mut q = sqlx::query_as::<_, User>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q = q.bind(id);

    q.fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

/// Replace a user's password hash.
pub async fn set_password_hash(pool: &DbPool, id: i64, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Update user's last login timestamp.
pub async fn update_last_login(pool: &DbPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user; the pcuser and sessions cascade.
pub async fn delete_user(pool: &DbPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Pcuser Queries
// ============================================================================

/// Create the profile row for a user.
pub async fn create_pcuser<'e, E>(executor: E, user_id: i64, profile: PcuserProfile) -> Result<Pcuser>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Pcuser>(
        r#"
        INSERT INTO pcusers (user_id, phone, age, gender, location)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&profile.phone)
    .bind(profile.age)
    .bind(&profile.gender)
    .bind(&profile.location)
    .fetch_one(executor)
    .await
    .map_err(|e| Error::from_write(e, &format!("Pcuser for user {}", user_id)))
}

/// Get a pcuser by ID.
pub async fn get_pcuser(pool: &DbPool, id: i64) -> Result<Option<Pcuser>> {
    sqlx::query_as::<_, Pcuser>("SELECT * FROM pcusers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Get the pcuser attached to a user.
pub async fn get_pcuser_by_user(pool: &DbPool, user_id: i64) -> Result<Option<Pcuser>> {
    sqlx::query_as::<_, Pcuser>("SELECT * FROM pcusers WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Find the pcuser holding a verification token hash.
pub async fn get_pcuser_by_verify_token(pool: &DbPool, token_hash: &str) -> Result<Option<Pcuser>> {
    sqlx::query_as::<_, Pcuser>("SELECT * FROM pcusers WHERE verify_token_hash = ?")
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Find the pcuser holding a password reset token hash.
pub async fn get_pcuser_by_reset_token(pool: &DbPool, token_hash: &str) -> Result<Option<Pcuser>> {
    sqlx::query_as::<_, Pcuser>("SELECT * FROM pcusers WHERE reset_token_hash = ?")
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// List all pcusers ordered by id.
pub async fn list_pcusers(pool: &DbPool) -> Result<Vec<Pcuser>> {
    sqlx::query_as::<_, Pcuser>("SELECT * FROM pcusers ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Replace the profile fields of a pcuser.
pub async fn update_pcuser_profile(
    pool: &DbPool,
    id: i64,
    profile: PcuserProfile,
) -> Result<Option<Pcuser>> {
    sqlx::query_as::<_, Pcuser>(
        r#"
        UPDATE pcusers SET phone = ?, age = ?, gender = ?, location = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&profile.phone)
    .bind(profile.age)
    .bind(&profile.gender)
    .bind(&profile.location)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

/// Delete a pcuser; posts, revisions and volunteer rows referencing it cascade.
pub async fn delete_pcuser(pool: &DbPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM pcusers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Store (or clear) the verification token hash.
pub async fn set_verify_token<'e, E>(executor: E, id: i64, token_hash: Option<&str>) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE pcusers SET verify_token_hash = ? WHERE id = ?")
        .bind(token_hash)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Store (or clear) the password reset token hash.
pub async fn set_reset_token(pool: &DbPool, id: i64, token_hash: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE pcusers SET reset_token_hash = ? WHERE id = ?")
        .bind(token_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark a pcuser verified and drop its verification token.
pub async fn mark_verified(pool: &DbPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE pcusers SET verified = 1, verify_token_hash = NULL WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

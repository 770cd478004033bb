//! Malaria post and revision queries.
//!
//! A revision row is a snapshot of a post's title and description. It is
//! written by the malaria service; nothing here compares or merges revisions.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::resource::Resource;
use super::DbPool;

// ============================================================================
// Types
// ============================================================================

/// Post record from the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Post {
    pub id: i64,
    #[serde(rename = "owner")]
    pub owner_id: i64,
    pub title_post: String,
    pub description_post: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Resource for Post {
    const TABLE: &'static str = "posts";
    const NAME: &'static str = "Post";
    const DESCRIPTION: &'static str = "Malaria posts. Read only.";
}

/// Title and description of a post, as submitted by its owner.
#[derive(Debug, Clone, Deserialize)]
pub struct PostContent {
    pub title_post: String,
    pub description_post: String,
}

/// Revision record from the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct RevPost {
    pub id: i64,
    #[serde(rename = "owner_rev")]
    pub owner_rev_id: i64,
    #[serde(rename = "owner_rev_post")]
    pub owner_rev_post_id: i64,
    pub title_post_rev: String,
    pub description_post_rev: String,
    pub title_change: bool,
    pub description_change: bool,
    pub created: DateTime<Utc>,
}

/// Input for inserting a revision.
#[derive(Debug, Clone)]
pub struct CreateRevPost {
    pub owner_rev_id: i64,
    pub owner_rev_post_id: i64,
    pub title_post_rev: String,
    pub description_post_rev: String,
    pub title_change: bool,
    pub description_change: bool,
}

// ============================================================================
// Post Queries
// ============================================================================

/// Create a post owned by a pcuser.
pub async fn create_post(pool: &DbPool, owner_id: i64, content: &PostContent) -> Result<Post> {
    let now = Utc::now();
    sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (owner_id, title_post, description_post, created, updated)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(&content.title_post)
    .bind(&content.description_post)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::from_write(e, "Post"))
}

/// Get a post by ID.
pub async fn get_post(pool: &DbPool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// List the posts of one owner, oldest first.
/// Uses idx_posts_owner index.
pub async fn list_posts_by_owner(pool: &DbPool, owner_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE owner_id = ? ORDER BY id")
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Replace a post's title and description.
pub async fn update_post(pool: &DbPool, id: i64, content: &PostContent) -> Result<Option<Post>> {
    sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts SET title_post = ?, description_post = ?, updated = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&content.title_post)
    .bind(&content.description_post)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

/// Delete a post; its revisions cascade.
pub async fn delete_post(pool: &DbPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Revision Queries
// ============================================================================

/// Insert a revision row.
pub async fn create_revpost(pool: &DbPool, input: CreateRevPost) -> Result<RevPost> {
    sqlx::query_as::<_, RevPost>(
        r#"
        INSERT INTO revposts (owner_rev_id, owner_rev_post_id, title_post_rev, description_post_rev,
                              title_change, description_change, created)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.owner_rev_id)
    .bind(input.owner_rev_post_id)
    .bind(&input.title_post_rev)
    .bind(&input.description_post_rev)
    .bind(input.title_change)
    .bind(input.description_change)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| Error::from_write(e, "Revision"))
}

/// List the revisions of a post, oldest first.
/// Uses idx_revposts_post index.
pub async fn list_revposts_for_post(pool: &DbPool, post_id: i64) -> Result<Vec<RevPost>> {
    sqlx::query_as::<_, RevPost>(
        "SELECT * FROM revposts WHERE owner_rev_post_id = ? ORDER BY id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Most recent revision of a post, if any.
pub async fn latest_revpost(pool: &DbPool, post_id: i64) -> Result<Option<RevPost>> {
    sqlx::query_as::<_, RevPost>(
        "SELECT * FROM revposts WHERE owner_rev_post_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

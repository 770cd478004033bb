//! Malaria post service.
//!
//! Posts belong to a pcuser. Every edit writes one revision row holding the
//! new title and description; the change flags record which of the two
//! differ from the previous revision, or from the post's own content when
//! there is none yet.

use tracing::{debug, info};

use crate::db::{self, CreateRevPost, DbPool, Post, PostContent, RevPost};
use crate::error::{Error, Result};

/// Service for posts and their revisions.
#[derive(Clone)]
pub struct MalariaService {
    db: DbPool,
}

impl MalariaService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a post owned by `owner_id` (a pcuser id).
    pub async fn create_post(&self, owner_id: i64, content: PostContent) -> Result<Post> {
        validate_content(&content)?;
        let post = db::create_post(&self.db, owner_id, &content).await?;
        info!(post_id = post.id, owner_id, "Created post");
        Ok(post)
    }

    /// Record a revision of `post` holding `title` and `description`.
    ///
    /// `post` is the post as it was before the change. Returns `None`, and
    /// writes nothing, when the title or description is empty.
    pub async fn create_revpost(
        &self,
        owner_id: i64,
        post: &Post,
        title: &str,
        description: &str,
    ) -> Result<Option<RevPost>> {
        if title.is_empty() || description.is_empty() {
            debug!(post_id = post.id, "Skipping revision with empty content");
            return Ok(None);
        }

        // Compare with the previous revision, or the post itself for the first
        let (prev_title, prev_description) = match db::latest_revpost(&self.db, post.id).await? {
            Some(prev) => (prev.title_post_rev, prev.description_post_rev),
            None => (post.title_post.clone(), post.description_post.clone()),
        };

        let revpost = db::create_revpost(
            &self.db,
            CreateRevPost {
                owner_rev_id: owner_id,
                owner_rev_post_id: post.id,
                title_post_rev: title.to_string(),
                description_post_rev: description.to_string(),
                title_change: title != prev_title,
                description_change: description != prev_description,
            },
        )
        .await?;

        Ok(Some(revpost))
    }

    /// Delete a post; false when it does not exist.
    pub async fn delete_post_by_id(&self, post_id: i64) -> Result<bool> {
        let deleted = db::delete_post(&self.db, post_id).await?;
        if deleted {
            info!(post_id, "Deleted post");
        }
        Ok(deleted)
    }

    /// Get a post; `None` when it does not exist.
    pub async fn get_post_by_id(&self, post_id: i64) -> Result<Option<Post>> {
        db::get_post(&self.db, post_id).await
    }

    /// Revisions recorded for a post, oldest first.
    pub async fn get_revposts_of_owner(&self, post_id: i64) -> Result<Vec<RevPost>> {
        db::list_revposts_for_post(&self.db, post_id).await
    }

    /// Posts owned by a pcuser, oldest first.
    pub async fn list_posts_by_owner(&self, owner_id: i64) -> Result<Vec<Post>> {
        db::list_posts_by_owner(&self.db, owner_id).await
    }

    /// Replace a post's content and record a revision.
    ///
    /// Only the owner may edit. Returns `None` when the post does not exist.
    pub async fn edit_post(
        &self,
        owner_id: i64,
        post_id: i64,
        content: PostContent,
    ) -> Result<Option<Post>> {
        validate_content(&content)?;

        let Some(before) = self.get_post_by_id(post_id).await? else {
            return Ok(None);
        };
        if before.owner_id != owner_id {
            return Err(Error::Forbidden);
        }

        let Some(after) = db::update_post(&self.db, post_id, &content).await? else {
            return Ok(None);
        };

        self.create_revpost(owner_id, &before, &after.title_post, &after.description_post)
            .await?;
        info!(post_id, owner_id, "Edited post");

        Ok(Some(after))
    }

    /// Delete a post on behalf of its owner.
    pub async fn delete_owned_post(&self, owner_id: i64, post_id: i64) -> Result<bool> {
        match self.get_post_by_id(post_id).await? {
            None => Ok(false),
            Some(post) if post.owner_id != owner_id => Err(Error::Forbidden),
            Some(_) => self.delete_post_by_id(post_id).await,
        }
    }
}

fn validate_content(content: &PostContent) -> Result<()> {
    db::require_text("title_post", &content.title_post)?;
    db::require_text("description_post", &content.description_post)
}

//! Comment service
//!
//! Comments live under an article and are removed with it. Adding and
//! deleting take the article's slug lock, so they cannot interleave with
//! the article's deletion.

use super::error::{Resource, ServiceError, ServiceResult};
use super::lock::SlugLocks;
use super::policy;
use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{Article, Comment, CreateCommentInput, UserId};
use chrono::Utc;
use std::sync::Arc;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    articles: Arc<dyn ArticleRepository>,
    locks: Arc<SlugLocks>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        articles: Arc<dyn ArticleRepository>,
        locks: Arc<SlugLocks>,
    ) -> Self {
        Self {
            comments,
            articles,
            locks,
        }
    }

    async fn article(&self, slug: &str) -> ServiceResult<Article> {
        self.articles
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))
    }

    /// Comments of an article, oldest first
    pub async fn get_comments(&self, slug: &str) -> ServiceResult<Vec<Comment>> {
        let mut comments = self
            .comments
            .list_for_article(slug)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    /// Add a comment by the caller
    ///
    /// # Errors
    /// - `Unauthorized` without a caller
    /// - `NotFound` if the article is missing
    /// - `InvalidInput` if the body is blank
    pub async fn add_comment(
        &self,
        caller: Option<UserId>,
        slug: &str,
        input: CreateCommentInput,
    ) -> ServiceResult<Comment> {
        let author_id = caller.ok_or(ServiceError::Unauthorized)?;
        let _guard = self.locks.acquire(slug).await;

        self.article(slug).await?;
        if input.body.trim().is_empty() {
            return Err(ServiceError::blank("body"));
        }

        let comment = self
            .comments
            .insert(slug, author_id, &input.body, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))?;

        tracing::info!("Comment {} added to '{}' by user {}", comment.id, slug, author_id);
        Ok(comment)
    }

    /// Delete a comment. Allowed for the comment's author and the article's author.
    ///
    /// # Errors
    /// - `NotFound` if the article or the comment is missing
    /// - `Unauthorized` without a caller
    /// - `Forbidden` for anyone else
    pub async fn delete_comment(
        &self,
        caller: Option<UserId>,
        slug: &str,
        id: i64,
    ) -> ServiceResult<()> {
        let _guard = self.locks.acquire(slug).await;

        let article = self.article(slug).await?;
        let comment = self
            .comments
            .get(slug, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::comment(slug, id)))?;

        if caller.is_none() {
            return Err(ServiceError::Unauthorized);
        }
        if !policy::can_delete_comment(caller, &article, &comment) {
            return Err(ServiceError::Forbidden(Resource::comment(slug, id)));
        }

        if !self.comments.delete(slug, id).await? {
            return Err(ServiceError::NotFound(Resource::comment(slug, id)));
        }

        tracing::info!("Comment {} deleted from '{}'", id, slug);
        Ok(())
    }
}

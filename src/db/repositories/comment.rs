//! Comment repository
//!
//! Comments reference their article by id in storage and are exposed by
//! slug. Inserts and listings check the article in the same statement or
//! transaction as the comment rows.

use crate::db::DynDatabasePool;
use crate::models::{Comment, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// Comment store capability
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Attach a comment to an article. Returns `None` if the article is missing.
    async fn insert(
        &self,
        slug: &str,
        author_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Comment>>;

    /// Get one comment of an article
    async fn get(&self, slug: &str, id: i64) -> Result<Option<Comment>>;

    /// All comments of an article, or `None` if the article is missing
    async fn list_for_article(&self, slug: &str) -> Result<Option<Vec<Comment>>>;

    /// Delete one comment of an article. Returns `false` if nothing matched.
    async fn delete(&self, slug: &str, id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, a.slug AS article_slug, c.body, c.author_id, c.created_at, c.updated_at
    FROM comments c
    JOIN articles a ON a.id = c.article_id
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn insert(
        &self,
        slug: &str,
        author_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Comment>> {
        let result = sqlx::query(
            r#"
            INSERT INTO comments (article_id, author_id, body, created_at, updated_at)
            SELECT id, ?, ?, ?, ? FROM articles WHERE slug = ?
            "#,
        )
        .bind(author_id)
        .bind(body)
        .bind(created_at)
        .bind(created_at)
        .bind(slug)
        .execute(self.pool.as_sqlite())
        .await
        .context("Failed to create comment")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Comment {
            id: result.last_insert_rowid(),
            article_slug: slug.to_string(),
            body: body.to_string(),
            author_id,
            created_at,
            updated_at: created_at,
        }))
    }

    async fn get(&self, slug: &str, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("{} WHERE a.slug = ? AND c.id = ?", COMMENT_SELECT))
            .bind(slug)
            .bind(id)
            .fetch_optional(self.pool.as_sqlite())
            .await
            .context("Failed to get comment")?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn list_for_article(&self, slug: &str) -> Result<Option<Vec<Comment>>> {
        let mut tx = self.pool.as_sqlite().begin().await?;

        let article_id: Option<i64> = sqlx::query_scalar("SELECT id FROM articles WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to look up article")?;
        let Some(article_id) = article_id else {
            return Ok(None);
        };

        let rows = sqlx::query(&format!(
            "{} WHERE c.article_id = ? ORDER BY c.id",
            COMMENT_SELECT
        ))
        .bind(article_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to list comments")?;
        tx.commit().await?;

        rows.iter()
            .map(row_to_comment)
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn delete(&self, slug: &str, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM comments WHERE id = ? AND article_id IN (SELECT id FROM articles WHERE slug = ?)",
        )
        .bind(id)
        .bind(slug)
        .execute(self.pool.as_sqlite())
        .await
        .context("Failed to delete comment")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        article_slug: row.try_get("article_slug")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

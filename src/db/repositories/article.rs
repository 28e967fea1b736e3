//! Article repository
//!
//! Database operations for articles, their ordered tags and favorites.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the article store capability
//! - `SqlxArticleRepository` implementing it on SQLite
//!
//! Every operation that assembles an article (row, tags, favorites) does so
//! inside a single transaction, so callers never see a half-applied write.

use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleFilter, NewArticle, UpdateArticleInput, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Article store capability
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Persist a new article. Returns `None` when the slug is already taken.
    async fn insert(&self, article: &NewArticle) -> Result<Option<Article>>;

    /// Get article by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Articles that may match the filter. Implementations are free to return
    /// a superset; the query engine applies the filter authoritatively.
    async fn candidates(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    /// Apply a partial update. Returns `None` if the slug is unknown.
    async fn update(
        &self,
        slug: &str,
        input: &UpdateArticleInput,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Article>>;

    /// Delete an article together with its comments and favorites.
    /// Returns `false` if the slug is unknown.
    async fn delete(&self, slug: &str) -> Result<bool>;

    /// Add or remove `user_id` from the favorite set. Idempotent.
    /// Returns the article as it stands afterwards, or `None` if unknown.
    async fn set_favorite(
        &self,
        slug: &str,
        user_id: UserId,
        favorited: bool,
    ) -> Result<Option<Article>>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn insert(&self, article: &NewArticle) -> Result<Option<Article>> {
        insert_article_sqlite(self.pool.as_sqlite(), article).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let mut tx = self.pool.as_sqlite().begin().await?;
        let article = load_articles(&mut tx, Scope::Slug(slug)).await?.pop();
        tx.commit().await?;
        Ok(article)
    }

    async fn candidates(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let mut tx = self.pool.as_sqlite().begin().await?;
        let articles = load_articles(&mut tx, Scope::Filter(filter)).await?;
        tx.commit().await?;
        Ok(articles)
    }

    async fn update(
        &self,
        slug: &str,
        input: &UpdateArticleInput,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Article>> {
        update_article_sqlite(self.pool.as_sqlite(), slug, input, updated_at).await
    }

    async fn delete(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE slug = ?")
            .bind(slug)
            .execute(self.pool.as_sqlite())
            .await
            .context("Failed to delete article")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_favorite(
        &self,
        slug: &str,
        user_id: UserId,
        favorited: bool,
    ) -> Result<Option<Article>> {
        set_favorite_sqlite(self.pool.as_sqlite(), slug, user_id, favorited).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const ARTICLE_COLUMNS: &str =
    "a.id, a.slug, a.title, a.description, a.body, a.author_id, a.created_at, a.updated_at";

/// Which articles a load touches
enum Scope<'a> {
    Slug(&'a str),
    Filter(&'a ArticleFilter),
}

/// Append a WHERE clause over `articles a` for the scope.
fn push_scope<'a>(qb: &mut QueryBuilder<'a, Sqlite>, scope: &Scope<'a>) {
    qb.push(" WHERE 1 = 1");
    match *scope {
        Scope::Slug(slug) => {
            qb.push(" AND a.slug = ").push_bind(slug);
        }
        Scope::Filter(filter) => {
            if let Some(tag) = &filter.tag {
                qb.push(" AND EXISTS (SELECT 1 FROM article_tags ft WHERE ft.article_id = a.id AND ft.tag = ")
                    .push_bind(tag.as_str())
                    .push(")");
            }
            if let Some(author_id) = filter.author_id {
                qb.push(" AND a.author_id = ").push_bind(author_id);
            }
            if let Some(user_id) = filter.favorited_by {
                qb.push(" AND EXISTS (SELECT 1 FROM favorites ff WHERE ff.article_id = a.id AND ff.user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }
    }
}

/// Load articles in scope along with their tags and favorite sets.
async fn load_articles(conn: &mut SqliteConnection, scope: Scope<'_>) -> Result<Vec<Article>> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM articles a", ARTICLE_COLUMNS));
    push_scope(&mut qb, &scope);
    qb.push(" ORDER BY a.id");
    let rows = qb
        .build()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load articles")?;

    let mut articles = rows
        .iter()
        .map(row_to_article_sqlite)
        .collect::<Result<Vec<_>>>()?;
    if articles.is_empty() {
        return Ok(articles);
    }
    let positions: HashMap<i64, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id, i))
        .collect();

    let mut qb = QueryBuilder::new(
        "SELECT t.article_id, t.tag FROM article_tags t WHERE t.article_id IN (SELECT a.id FROM articles a",
    );
    push_scope(&mut qb, &scope);
    qb.push(") ORDER BY t.article_id, t.position");
    let rows = qb
        .build()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load article tags")?;
    for row in rows {
        let article_id: i64 = row.try_get("article_id")?;
        if let Some(&i) = positions.get(&article_id) {
            articles[i].tag_list.push(row.try_get("tag")?);
        }
    }

    let mut qb = QueryBuilder::new(
        "SELECT f.article_id, f.user_id FROM favorites f WHERE f.article_id IN (SELECT a.id FROM articles a",
    );
    push_scope(&mut qb, &scope);
    qb.push(")");
    let rows = qb
        .build()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load favorites")?;
    for row in rows {
        let article_id: i64 = row.try_get("article_id")?;
        if let Some(&i) = positions.get(&article_id) {
            articles[i].favorited_by.insert(row.try_get("user_id")?);
        }
    }

    Ok(articles)
}

async fn replace_tags(conn: &mut SqliteConnection, article_id: i64, tags: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article tags")?;

    for (position, tag) in tags.iter().enumerate() {
        sqlx::query("INSERT INTO article_tags (article_id, position, tag) VALUES (?, ?, ?)")
            .bind(article_id)
            .bind(position as i64)
            .bind(tag)
            .execute(&mut *conn)
            .await
            .context("Failed to insert article tag")?;
    }

    Ok(())
}

async fn insert_article_sqlite(pool: &SqlitePool, article: &NewArticle) -> Result<Option<Article>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.body)
    .bind(article.author_id)
    .bind(article.created_at)
    .bind(article.created_at)
    .execute(&mut *tx)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Ok(None),
        Err(e) => return Err(e).context("Failed to insert article"),
    };

    replace_tags(&mut tx, id, &article.tag_list).await?;
    let created = load_articles(&mut tx, Scope::Slug(&article.slug)).await?.pop();
    tx.commit().await.context("Failed to commit article")?;

    Ok(created)
}

async fn update_article_sqlite(
    pool: &SqlitePool,
    slug: &str,
    input: &UpdateArticleInput,
    updated_at: DateTime<Utc>,
) -> Result<Option<Article>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        UPDATE articles
        SET title = COALESCE(?, title),
            description = COALESCE(?, description),
            body = COALESCE(?, body),
            updated_at = ?
        WHERE slug = ?
        "#,
    )
    .bind(input.title.as_deref())
    .bind(input.description.as_deref())
    .bind(input.body.as_deref())
    .bind(updated_at)
    .bind(slug)
    .execute(&mut *tx)
    .await
    .context("Failed to update article")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    if let Some(tags) = &input.tag_list {
        let id: i64 = sqlx::query_scalar("SELECT id FROM articles WHERE slug = ?")
            .bind(slug)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to resolve article id")?;
        replace_tags(&mut tx, id, tags).await?;
    }

    let updated = load_articles(&mut tx, Scope::Slug(slug)).await?.pop();
    tx.commit().await.context("Failed to commit article update")?;

    Ok(updated)
}

async fn set_favorite_sqlite(
    pool: &SqlitePool,
    slug: &str,
    user_id: UserId,
    favorited: bool,
) -> Result<Option<Article>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let sql = if favorited {
        "INSERT OR IGNORE INTO favorites (article_id, user_id) SELECT id, ? FROM articles WHERE slug = ?"
    } else {
        "DELETE FROM favorites WHERE user_id = ? AND article_id IN (SELECT id FROM articles WHERE slug = ?)"
    };
    sqlx::query(sql)
        .bind(user_id)
        .bind(slug)
        .execute(&mut *tx)
        .await
        .context("Failed to toggle favorite")?;

    let article = load_articles(&mut tx, Scope::Slug(slug)).await?.pop();
    tx.commit().await.context("Failed to commit favorite")?;

    Ok(article)
}

fn row_to_article_sqlite(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        body: row.try_get("body")?,
        tag_list: Vec::new(),
        author_id: row.try_get("author_id")?,
        favorited_by: BTreeSet::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

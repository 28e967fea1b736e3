//! Article service
//!
//! Implements the article lifecycle:
//! - Create with slug generation and collision suffixes
//! - Public reads, listings and the personalised feed
//! - Owner-only update and delete
//! - Idempotent favorite/unfavorite
//!
//! Mutations of one slug are serialized through `SlugLocks`.

use super::error::{Resource, ServiceError, ServiceResult};
use super::lock::SlugLocks;
use super::lookup::bounded;
use super::policy;
use super::query;
use crate::config::ListingConfig;
use crate::db::repositories::{ArticleRepository, FollowGraph};
use crate::models::{
    normalize_tags, Article, ArticleFilter, ArticlePage, CreateArticleInput, NewArticle,
    Pagination, UpdateArticleInput, UserId,
};
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Attempts at finding a free slug before giving up
const SLUG_ATTEMPTS: usize = 5;

/// Slug used when a title has no usable characters
const FALLBACK_SLUG: &str = "article";

pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    follows: Arc<dyn FollowGraph>,
    locks: Arc<SlugLocks>,
    listing: ListingConfig,
    lookup_timeout: Duration,
}

impl ArticleService {
    /// Create a new article service
    ///
    /// # Arguments
    /// * `articles` - Article store
    /// * `follows` - Follow graph consulted by the feed
    /// * `locks` - Per-slug lock table, shared with the comment service
    /// * `listing` - Page size defaults and limits
    /// * `lookup_timeout` - Bound on each follow-graph call
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        follows: Arc<dyn FollowGraph>,
        locks: Arc<SlugLocks>,
        listing: ListingConfig,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            articles,
            follows,
            locks,
            listing,
            lookup_timeout,
        }
    }

    /// Parse raw pagination parameters against this service's limits
    pub fn pagination(&self, offset: Option<&str>, limit: Option<&str>) -> ServiceResult<Pagination> {
        query::parse_pagination(offset, limit, &self.listing)
    }

    /// Articles matching every filter, newest first
    pub async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: Pagination,
    ) -> ServiceResult<ArticlePage> {
        let candidates = self.articles.candidates(filter).await?;
        let page = query::select(candidates, filter, None, page);
        tracing::debug!("Listed {} of {} articles", page.articles.len(), page.total);
        Ok(page)
    }

    /// Articles by authors the caller follows, newest first
    ///
    /// # Errors
    /// - `Unauthorized` without a caller
    /// - `ServiceUnavailable` if any follow-graph lookup fails
    pub async fn feed(&self, caller: Option<UserId>, page: Pagination) -> ServiceResult<ArticlePage> {
        let caller = caller.ok_or(ServiceError::Unauthorized)?;

        let filter = ArticleFilter::default();
        let candidates = self.articles.candidates(&filter).await?;
        let authors: BTreeSet<UserId> = candidates.iter().map(|a| a.author_id).collect();

        let checks = authors.into_iter().map(|author| async move {
            let follows = bounded(
                self.lookup_timeout,
                "follow-graph lookup",
                self.follows.is_following(caller, author),
            )
            .await?;
            Ok::<_, ServiceError>((author, follows))
        });
        let followed: HashSet<UserId> = try_join_all(checks)
            .await?
            .into_iter()
            .filter_map(|(author, follows)| follows.then_some(author))
            .collect();

        Ok(query::select(candidates, &filter, Some(&followed), page))
    }

    /// Create a new article authored by the caller
    ///
    /// # Errors
    /// - `Unauthorized` without a caller
    /// - `InvalidInput` if title or body is blank
    pub async fn create_article(
        &self,
        caller: Option<UserId>,
        input: CreateArticleInput,
    ) -> ServiceResult<Article> {
        let author_id = caller.ok_or(ServiceError::Unauthorized)?;
        require_text("title", &input.title)?;
        require_text("body", &input.body)?;

        let base = generate_slug(&input.title);
        let mut new_article = NewArticle {
            slug: base.clone(),
            title: input.title,
            description: input.description,
            body: input.body,
            tag_list: normalize_tags(&input.tag_list),
            author_id,
            created_at: Utc::now(),
        };

        for _ in 0..SLUG_ATTEMPTS {
            if let Some(article) = self.articles.insert(&new_article).await? {
                tracing::info!("Article '{}' created by user {}", article.slug, author_id);
                return Ok(article);
            }
            tracing::debug!("Slug '{}' is taken", new_article.slug);
            new_article.slug = format!("{}-{}", base, slug_suffix());
        }

        Err(anyhow::anyhow!("no free slug for '{}' after {} attempts", base, SLUG_ATTEMPTS).into())
    }

    /// Get an article by slug
    pub async fn get_article(&self, slug: &str) -> ServiceResult<Article> {
        self.articles
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))
    }

    /// Apply the fields present in `patch`
    ///
    /// The slug is kept even when the title changes. A patch with no fields
    /// leaves the article untouched.
    ///
    /// # Errors
    /// - `NotFound` for an unknown slug
    /// - `Unauthorized` without a caller
    /// - `Forbidden` unless the caller is the author
    /// - `InvalidInput` if title or body is set to blank
    pub async fn update_article(
        &self,
        caller: Option<UserId>,
        slug: &str,
        mut patch: UpdateArticleInput,
    ) -> ServiceResult<Article> {
        let _guard = self.locks.acquire(slug).await;
        let existing = self.get_article(slug).await?;
        authorize(caller, &existing)?;

        if let Some(ref title) = patch.title {
            require_text("title", title)?;
        }
        if let Some(ref body) = patch.body {
            require_text("body", body)?;
        }
        if let Some(tags) = patch.tag_list.take() {
            patch.tag_list = Some(normalize_tags(&tags));
        }
        if !patch.has_changes() {
            return Ok(existing);
        }

        let updated_at = Utc::now().max(existing.updated_at + ChronoDuration::microseconds(1));
        let article = self
            .articles
            .update(slug, &patch, updated_at)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))?;

        tracing::info!("Article '{}' updated", slug);
        Ok(article)
    }

    /// Run the lookup and ownership checks of an update or delete without
    /// changing anything.
    pub async fn check_modify(&self, caller: Option<UserId>, slug: &str) -> ServiceResult<()> {
        let existing = self.get_article(slug).await?;
        authorize(caller, &existing)
    }

    /// Delete an article and all of its comments
    ///
    /// Same error chain as `update_article`.
    pub async fn delete_article(&self, caller: Option<UserId>, slug: &str) -> ServiceResult<()> {
        let _guard = self.locks.acquire(slug).await;
        let existing = self.get_article(slug).await?;
        authorize(caller, &existing)?;

        if !self.articles.delete(slug).await? {
            return Err(ServiceError::NotFound(Resource::article(slug)));
        }

        tracing::info!("Article '{}' deleted", slug);
        Ok(())
    }

    /// Add the caller to the article's favorites. Favoriting twice is a no-op.
    pub async fn favorite_article(&self, caller: Option<UserId>, slug: &str) -> ServiceResult<Article> {
        self.set_favorite(caller, slug, true).await
    }

    /// Remove the caller from the article's favorites. Unfavoriting twice is a no-op.
    pub async fn unfavorite_article(&self, caller: Option<UserId>, slug: &str) -> ServiceResult<Article> {
        self.set_favorite(caller, slug, false).await
    }

    async fn set_favorite(
        &self,
        caller: Option<UserId>,
        slug: &str,
        favorited: bool,
    ) -> ServiceResult<Article> {
        let user_id = caller.ok_or(ServiceError::Unauthorized)?;
        let _guard = self.locks.acquire(slug).await;

        let article = self
            .articles
            .set_favorite(slug, user_id, favorited)
            .await?
            .ok_or_else(|| ServiceError::NotFound(Resource::article(slug)))?;

        tracing::debug!(
            "User {} set favorite={} on '{}' ({} total)",
            user_id,
            favorited,
            slug,
            article.favorites_count()
        );
        Ok(article)
    }
}

fn authorize(caller: Option<UserId>, article: &Article) -> ServiceResult<()> {
    match caller {
        None => Err(ServiceError::Unauthorized),
        Some(_) if policy::can_modify(caller, article) => Ok(()),
        Some(_) => Err(ServiceError::Forbidden(Resource::article(&article.slug))),
    }
}

fn require_text(field: &'static str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::blank(field));
    }
    Ok(())
}

fn slug_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Generate a URL-friendly slug from a title
///
/// Lowercases, keeps ASCII alphanumerics and non-ASCII letters, turns
/// everything else into single hyphens and trims them from both ends.
pub fn generate_slug(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut result = String::new();
    let mut prev_hyphen = false;

    for c in slug.chars() {
        if c == '-' {
            if !prev_hyphen && !result.is_empty() {
                result.push(c);
                prev_hyphen = true;
            }
        } else {
            result.push(c);
            prev_hyphen = false;
        }
    }

    let result = result.trim_end_matches('-');
    if result.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        result.to_string()
    }
}

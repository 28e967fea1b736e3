//! Article model
//!
//! This module provides:
//! - `Article` entity with its favorite set
//! - Input types for creating and patching articles
//! - Filter and pagination types for listing queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::UserId;

/// Article entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Store-assigned identifier, used to order articles created at the same instant
    pub id: i64,
    /// URL-friendly slug, fixed at creation
    pub slug: String,
    /// Article title
    pub title: String,
    /// Short description
    pub description: String,
    /// Markdown body
    pub body: String,
    /// Tags in display order, no duplicates
    pub tag_list: Vec<String>,
    /// Author user ID
    pub author_id: UserId,
    /// Users who favorited this article
    pub favorited_by: BTreeSet<UserId>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last content update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Number of users who favorited the article.
    pub fn favorites_count(&self) -> usize {
        self.favorited_by.len()
    }

    /// Whether the given caller has favorited the article.
    pub fn is_favorited_by(&self, user: Option<UserId>) -> bool {
        user.is_some_and(|id| self.favorited_by.contains(&id))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list.iter().any(|t| t == tag)
    }
}

/// Input for creating a new article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl CreateArticleInput {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            body: body.into(),
            tag_list: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_list = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Fully resolved record handed to the article store on creation
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

impl UpdateArticleInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_list = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.body.is_some()
            || self.tag_list.is_some()
    }

    /// Apply the patch to an article in place.
    pub fn apply(&self, article: &mut Article, updated_at: DateTime<Utc>) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        if let Some(description) = &self.description {
            article.description = description.clone();
        }
        if let Some(body) = &self.body {
            article.body = body.clone();
        }
        if let Some(tags) = &self.tag_list {
            article.tag_list = tags.clone();
        }
        article.updated_at = updated_at;
    }
}

/// Listing filters. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author_id: Option<UserId>,
    pub favorited_by: Option<UserId>,
}

impl ArticleFilter {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_author(mut self, author_id: UserId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_favorited_by(mut self, user_id: UserId) -> Self {
        self.favorited_by = Some(user_id);
        self
    }
}

/// Window over an ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

/// One page of a listing plus the size of the full match set
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: usize,
}

/// Normalize a tag list: trim entries, drop empties, keep the first of any duplicates.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

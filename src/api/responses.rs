//! Wire types
//!
//! Request and response bodies, in the camelCase field naming clients
//! expect. Timestamps are RFC 3339 in UTC with millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Article, Comment, CreateArticleInput, Profile, UpdateArticleInput, UserId};

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Requests
// ============================================================================

/// `{"article": {...}}`
#[derive(Debug, Deserialize)]
pub struct ArticleBody<T> {
    pub article: T,
}

/// `{"comment": {...}}`
#[derive(Debug, Deserialize)]
pub struct CommentBody<T> {
    pub comment: T,
}

/// Fields of a new article. Missing text fields arrive empty and are
/// rejected by the service with the field name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticleRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl From<NewArticleRequest> for CreateArticleInput {
    fn from(req: NewArticleRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            body: req.body,
            tag_list: req.tag_list,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

impl From<UpdateArticleRequest> for UpdateArticleInput {
    fn from(req: UpdateArticleRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            body: req.body,
            tag_list: req.tag_list,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewCommentRequest {
    #[serde(default)]
    pub body: String,
}

/// Listing query string. Values stay raw so malformed numbers can be
/// reported as query errors rather than rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct ListArticlesQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub favorited: bool,
    pub favorites_count: usize,
    pub author: Profile,
}

impl ArticleResponse {
    /// Render `article` for `viewer`, with its author's profile
    pub fn new(article: Article, viewer: Option<UserId>, author: Profile) -> Self {
        Self {
            favorited: article.is_favorited_by(viewer),
            favorites_count: article.favorites_count(),
            created_at: timestamp(article.created_at),
            updated_at: timestamp(article.updated_at),
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tag_list,
            author,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SingleArticleResponse {
    pub article: ArticleResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleArticlesResponse {
    pub articles: Vec<ArticleResponse>,
    pub articles_count: usize,
}

impl MultipleArticlesResponse {
    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            articles_count: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub body: String,
    pub author: Profile,
}

impl CommentResponse {
    pub fn new(comment: Comment, author: Profile) -> Self {
        Self {
            id: comment.id,
            created_at: timestamp(comment.created_at),
            updated_at: timestamp(comment.updated_at),
            body: comment.body,
            author,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SingleCommentResponse {
    pub comment: CommentResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultipleCommentsResponse {
    pub comments: Vec<CommentResponse>,
}

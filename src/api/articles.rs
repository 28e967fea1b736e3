//! Article API endpoints
//!
//! - GET    /api/articles               - List articles with filters and pagination
//! - GET    /api/articles/feed          - Articles by followed authors
//! - POST   /api/articles               - Create article
//! - GET    /api/articles/{slug}        - Get article
//! - PUT    /api/articles/{slug}        - Update article
//! - DELETE /api/articles/{slug}        - Delete article
//! - POST   /api/articles/{slug}/favorite - Favorite article
//! - DELETE /api/articles/{slug}/favorite - Unfavorite article

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, Caller};
use crate::api::responses::{
    ArticleBody, ArticleResponse, FeedQuery, ListArticlesQuery, MultipleArticlesResponse,
    NewArticleRequest, SingleArticleResponse, UpdateArticleRequest,
};
use crate::models::{Article, ArticleFilter, ArticlePage, UserId};
use crate::services::ServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/feed", get(feed))
        .route(
            "/articles/{slug}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/{slug}/favorite",
            post(favorite_article).delete(unfavorite_article),
        )
}

async fn render(
    state: &AppState,
    article: Article,
    viewer: Option<UserId>,
) -> Result<Json<SingleArticleResponse>, ApiError> {
    let author = state
        .profile_service
        .profile(article.author_id, viewer)
        .await?;
    Ok(Json(SingleArticleResponse {
        article: ArticleResponse::new(article, viewer, author),
    }))
}

async fn render_page(
    state: &AppState,
    page: ArticlePage,
    viewer: Option<UserId>,
) -> Result<Json<MultipleArticlesResponse>, ApiError> {
    let profiles = state
        .profile_service
        .profiles(page.articles.iter().map(|a| a.author_id), viewer)
        .await?;

    let articles = page
        .articles
        .into_iter()
        .map(|article| {
            let author = profiles.get(&article.author_id).cloned().ok_or_else(|| {
                ApiError::internal_error(format!("Missing profile for user {}", article.author_id))
            })?;
            Ok(ArticleResponse::new(article, viewer, author))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(MultipleArticlesResponse {
        articles,
        articles_count: page.total,
    }))
}

/// GET /api/articles
///
/// `author` and `favorited` are usernames; an unknown username matches nothing.
pub async fn list_articles(
    State(state): State<AppState>,
    Caller(caller): Caller,
    query: Result<Query<ListArticlesQuery>, QueryRejection>,
) -> Result<Json<MultipleArticlesResponse>, ApiError> {
    let Query(query) = query?;
    let page = state
        .article_service
        .pagination(query.offset.as_deref(), query.limit.as_deref())?;

    let mut filter = ArticleFilter::default();
    if let Some(tag) = query.tag {
        filter = filter.with_tag(tag);
    }
    if let Some(ref author) = query.author {
        match state.profile_service.resolve_username(author).await? {
            Some(id) => filter = filter.with_author(id),
            None => return Ok(Json(MultipleArticlesResponse::empty())),
        }
    }
    if let Some(ref username) = query.favorited {
        match state.profile_service.resolve_username(username).await? {
            Some(id) => filter = filter.with_favorited_by(id),
            None => return Ok(Json(MultipleArticlesResponse::empty())),
        }
    }

    let result = state.article_service.list_articles(&filter, page).await?;
    render_page(&state, result, caller).await
}

/// GET /api/articles/feed
pub async fn feed(
    State(state): State<AppState>,
    Caller(caller): Caller,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<MultipleArticlesResponse>, ApiError> {
    if caller.is_none() {
        return Err(ServiceError::Unauthorized.into());
    }
    let Query(query) = query?;
    let page = state
        .article_service
        .pagination(query.offset.as_deref(), query.limit.as_deref())?;
    let result = state.article_service.feed(caller, page).await?;
    render_page(&state, result, caller).await
}

/// POST /api/articles
pub async fn create_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<ArticleBody<NewArticleRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<SingleArticleResponse>), ApiError> {
    if caller.is_none() {
        return Err(ServiceError::Unauthorized.into());
    }
    let Json(body) = payload?;

    let article = state
        .article_service
        .create_article(caller, body.article.into())
        .await?;
    Ok((StatusCode::CREATED, render(&state, article, caller).await?))
}

/// GET /api/articles/{slug}
pub async fn get_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
) -> Result<Json<SingleArticleResponse>, ApiError> {
    let article = state.article_service.get_article(&slug).await?;
    render(&state, article, caller).await
}

/// PUT /api/articles/{slug}
///
/// A malformed body is reported only after the article and ownership checks.
pub async fn update_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
    payload: Result<Json<ArticleBody<UpdateArticleRequest>>, JsonRejection>,
) -> Result<Json<SingleArticleResponse>, ApiError> {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            state.article_service.check_modify(caller, &slug).await?;
            return Err(rejection.into());
        }
    };
    let article = state
        .article_service
        .update_article(caller, &slug, body.article.into())
        .await?;
    render(&state, article, caller).await
}

/// DELETE /api/articles/{slug}
pub async fn delete_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete_article(caller, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/articles/{slug}/favorite
pub async fn favorite_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
) -> Result<Json<SingleArticleResponse>, ApiError> {
    let article = state.article_service.favorite_article(caller, &slug).await?;
    render(&state, article, caller).await
}

/// DELETE /api/articles/{slug}/favorite
pub async fn unfavorite_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
) -> Result<Json<SingleArticleResponse>, ApiError> {
    let article = state
        .article_service
        .unfavorite_article(caller, &slug)
        .await?;
    render(&state, article, caller).await
}

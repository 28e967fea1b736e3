//! Comment API endpoints
//!
//! - GET    /api/articles/{slug}/comments      - List comments, oldest first
//! - POST   /api/articles/{slug}/comments      - Add comment
//! - DELETE /api/articles/{slug}/comments/{id} - Delete comment

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, Caller};
use crate::api::responses::{
    CommentBody, CommentResponse, MultipleCommentsResponse, NewCommentRequest,
    SingleCommentResponse,
};
use crate::models::CreateCommentInput;
use crate::services::ServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/articles/{slug}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/articles/{slug}/comments/{id}", delete(delete_comment))
}

/// GET /api/articles/{slug}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
) -> Result<Json<MultipleCommentsResponse>, ApiError> {
    let comments = state.comment_service.get_comments(&slug).await?;
    let profiles = state
        .profile_service
        .profiles(comments.iter().map(|c| c.author_id), caller)
        .await?;

    let comments = comments
        .into_iter()
        .map(|comment| {
            let author = profiles.get(&comment.author_id).cloned().ok_or_else(|| {
                ApiError::internal_error(format!("Missing profile for user {}", comment.author_id))
            })?;
            Ok(CommentResponse::new(comment, author))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(MultipleCommentsResponse { comments }))
}

/// POST /api/articles/{slug}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(slug): Path<String>,
    payload: Result<Json<CommentBody<NewCommentRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<SingleCommentResponse>), ApiError> {
    if caller.is_none() {
        return Err(ServiceError::Unauthorized.into());
    }
    let Json(body) = payload?;

    let comment = state
        .comment_service
        .add_comment(
            caller,
            &slug,
            CreateCommentInput {
                body: body.comment.body,
            },
        )
        .await?;
    let author = state
        .profile_service
        .profile(comment.author_id, caller)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SingleCommentResponse {
            comment: CommentResponse::new(comment, author),
        }),
    ))
}

/// DELETE /api/articles/{slug}/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path((slug, id)) = path?;
    state
        .comment_service
        .delete_comment(caller, &slug, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

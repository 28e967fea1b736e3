//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The `ApiError` wire format and its mapping from `ServiceError`
//! - Caller identity resolution from session tokens

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::db::repositories::SessionRepository;
use crate::models::UserId;
use crate::services::lookup::bounded;
use crate::services::{ArticleService, CommentService, ProfileService, ServiceError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub article_service: Arc<ArticleService>,
    pub comment_service: Arc<CommentService>,
    pub profile_service: Arc<ProfileService>,
    pub sessions: Arc<dyn SessionRepository>,
    /// Bound on each session lookup
    pub lookup_timeout: Duration,
}

/// Identity of the requester, `None` for anonymous requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller(pub Option<UserId>);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().copied().unwrap_or_default())
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "INVALID_QUERY" => StatusCode::BAD_REQUEST,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidInput { field, .. } => Self::with_details(
                "VALIDATION_ERROR",
                message,
                serde_json::json!({ "field": field }),
            ),
            ServiceError::InvalidQuery { param, value } => Self::with_details(
                "INVALID_QUERY",
                message,
                serde_json::json!({ "param": param, "value": value }),
            ),
            ServiceError::Unauthorized => Self::unauthorized(message),
            ServiceError::Forbidden(_) => Self::forbidden(message),
            ServiceError::NotFound(_) => Self::not_found(message),
            ServiceError::ServiceUnavailable(_) => Self::service_unavailable(message),
            ServiceError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new("INVALID_QUERY", rejection.body_text())
    }
}

/// Extract the session token from `Authorization: Token <t>` or
/// `Authorization: Bearer <t>`
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve the caller for every request
///
/// Requests without a token, or with an unknown or expired one, continue
/// as anonymous. A failing session store ends the request with 503.
pub async fn resolve_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match extract_token(request.headers()) {
        Some(token) => {
            bounded(
                state.lookup_timeout,
                "session lookup",
                state.sessions.resolve(&token),
            )
            .await?
        }
        None => None,
    };

    request.extensions_mut().insert(Caller(caller));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Resource;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_token_schemes() {
        assert_eq!(extract_token(&headers_with_auth("Token abc")), Some("abc".to_string()));
        assert_eq!(extract_token(&headers_with_auth("Bearer xyz")), Some("xyz".to_string()));
    }

    #[test]
    fn test_extract_token_none() {
        assert!(extract_token(&HeaderMap::new()).is_none());
        assert!(extract_token(&headers_with_auth("Basic invalid")).is_none());
        assert!(extract_token(&headers_with_auth("Token ")).is_none());
    }

    #[test]
    fn test_service_error_statuses() {
        let cases = [
            (ServiceError::blank("title"), StatusCode::BAD_REQUEST),
            (
                ServiceError::InvalidQuery {
                    param: "limit",
                    value: "x".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden(Resource::article("foo")), StatusCode::FORBIDDEN),
            (ServiceError::NotFound(Resource::comment("foo", 1)), StatusCode::NOT_FOUND),
            (
                ServiceError::ServiceUnavailable("follow-graph lookup timed out".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServiceError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_error_names_field() {
        let err = ApiError::from(ServiceError::blank("body"));
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert_eq!(err.error.details, Some(serde_json::json!({ "field": "body" })));
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::from(ServiceError::Internal(anyhow::anyhow!("secret path")));
        assert!(!err.error.message.contains("secret"));
    }

    #[test]
    fn test_api_error_serialization() {
        let json = serde_json::to_value(ApiError::not_found("gone")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": { "code": "NOT_FOUND", "message": "gone" } }));
    }
}

//! API layer - HTTP handlers and routing
//!
//! - Article endpoints (listing, feed, CRUD, favorites)
//! - Comment endpoints nested under articles
//! - Caller resolution, CORS and request tracing

pub mod articles;
pub mod comments;
pub mod middleware;
pub mod responses;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, Caller};

/// Build the API router, without state or middleware
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .merge(articles::router())
        .merge(comments::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api", build_api_router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_caller,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}

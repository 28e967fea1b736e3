//! Conduit - article service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conduit::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::Stores,
    services::{ArticleService, CommentService, ProfileService, SlugLocks},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conduit=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Conduit...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Open stores (runs migrations for SQLite)
    let stores = Stores::open(&config.database).await?;

    // Initialize cache
    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    // Initialize services
    let lookup_timeout = config.collaborators.lookup_timeout();
    let locks = Arc::new(SlugLocks::new());
    let article_service = Arc::new(ArticleService::new(
        stores.articles.clone(),
        stores.follows.clone(),
        locks.clone(),
        config.listing,
        lookup_timeout,
    ));
    let comment_service = Arc::new(CommentService::new(
        stores.comments.clone(),
        stores.articles.clone(),
        locks,
    ));
    let profile_service = Arc::new(ProfileService::new(
        stores.users.clone(),
        stores.follows.clone(),
        cache,
        lookup_timeout,
    ));

    let state = AppState {
        article_service,
        comment_service,
        profile_service,
        sessions: stores.sessions,
        lookup_timeout,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

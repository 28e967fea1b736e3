//! Store wiring
//!
//! Bundles one handle per capability so the binary and the tests can pick
//! a backend in one place.

use super::migrations::run_migrations;
use super::pool::{create_pool, DynDatabasePool};
use super::repositories::{
    ArticleRepository, CommentRepository, FollowGraph, MemoryRepository, SessionRepository,
    SqlxArticleRepository, SqlxCommentRepository, SqlxFollowGraph, SqlxSessionRepository,
    SqlxUserDirectory, UserDirectory,
};
use crate::config::{DatabaseConfig, DatabaseDriver};
use anyhow::Result;
use std::sync::Arc;

/// One handle per store capability
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowGraph>,
    pub users: Arc<dyn UserDirectory>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Stores {
    /// SQLx-backed stores sharing one pool
    pub fn sqlite(pool: DynDatabasePool) -> Self {
        Self {
            articles: SqlxArticleRepository::boxed(pool.clone()),
            comments: SqlxCommentRepository::boxed(pool.clone()),
            follows: SqlxFollowGraph::boxed(pool.clone()),
            users: SqlxUserDirectory::boxed(pool.clone()),
            sessions: SqlxSessionRepository::boxed(pool),
        }
    }

    /// Every capability served by one in-memory repository
    pub fn memory(repo: Arc<MemoryRepository>) -> Self {
        Self {
            articles: repo.clone(),
            comments: repo.clone(),
            follows: repo.clone(),
            users: repo.clone(),
            sessions: repo,
        }
    }

    /// Open the backend selected by `config`, running migrations for SQLite
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        match config.driver {
            DatabaseDriver::Sqlite => {
                if !config.seed.is_empty() {
                    tracing::warn!("database.seed is only applied by the memory driver; ignoring it");
                }
                let pool = create_pool(config).await?;
                run_migrations(&pool).await?;
                tracing::info!("Database ready: {}", config.url);
                Ok(Self::sqlite(pool))
            }
            DatabaseDriver::Memory => {
                tracing::warn!("Using the in-memory store; data will not survive a restart");
                let repo = MemoryRepository::new();
                repo.apply_seed(&config.seed)?;
                Ok(Self::memory(Arc::new(repo)))
            }
        }
    }
}

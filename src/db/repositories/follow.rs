//! Follow graph
//!
//! Read-only view of who follows whom. Feeds and author profiles consult it;
//! follow/unfollow is managed outside this service.

use crate::db::DynDatabasePool;
use crate::models::UserId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Whether `follower` follows `author`
    async fn is_following(&self, follower: UserId, author: UserId) -> Result<bool>;
}

/// SQLx-based follow graph backed by the `follows` table
pub struct SqlxFollowGraph {
    pool: DynDatabasePool,
}

impl SqlxFollowGraph {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowGraph> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowGraph for SqlxFollowGraph {
    async fn is_following(&self, follower: UserId, author: UserId) -> Result<bool> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?",
        )
        .bind(follower)
        .bind(author)
        .fetch_optional(self.pool.as_sqlite())
        .await
        .context("Failed to query follow graph")?;

        Ok(row.is_some())
    }
}

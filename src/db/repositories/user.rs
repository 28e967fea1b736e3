//! User directory
//!
//! Lookup of public user profiles by id or username.

use crate::db::DynDatabasePool;
use crate::models::{UserId, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// User directory trait
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Get user by ID
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserProfile>>;

    /// Get user by username
    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>>;
}

/// SQLx-based user directory implementation
pub struct SqlxUserDirectory {
    pool: DynDatabasePool,
}

impl SqlxUserDirectory {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserDirectory> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserDirectory for SqlxUserDirectory {
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, username, bio, image FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.as_sqlite())
            .await
            .context("Failed to get user by id")?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, username, bio, image FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool.as_sqlite())
            .await
            .context("Failed to get user by username")?;

        row.as_ref().map(row_to_profile).transpose()
    }
}

fn row_to_profile(row: &SqliteRow) -> Result<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        bio: row.try_get("bio")?,
        image: row.try_get("image")?,
    })
}

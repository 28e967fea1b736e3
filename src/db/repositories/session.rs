//! Session repository
//!
//! Maps access tokens issued elsewhere to the user they belong to.

use crate::db::DynDatabasePool;
use crate::models::{Session, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Resolve a token to its user, ignoring expired sessions
    async fn resolve(&self, token: &str) -> Result<Option<UserId>>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT token, user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(self.pool.as_sqlite())
            .await
            .context("Failed to get session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let session = Session {
            token: row.try_get("token")?,
            user_id: row.try_get("user_id")?,
            expires_at: row.try_get("expires_at")?,
        };

        Ok((!session.is_expired()).then_some(session.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_resolve_skips_expired() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite();
        sqlx::query("INSERT INTO users (username) VALUES ('alice')")
            .execute(sqlite)
            .await
            .unwrap();
        for (token, expires_at) in [
            ("live", Utc::now() + Duration::hours(1)),
            ("stale", Utc::now() - Duration::hours(1)),
        ] {
            sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, 1, ?)")
                .bind(token)
                .bind(expires_at)
                .execute(sqlite)
                .await
                .unwrap();
        }

        let sessions = SqlxSessionRepository::new(pool);
        assert_eq!(sessions.resolve("live").await.unwrap(), Some(1));
        assert_eq!(sessions.resolve("stale").await.unwrap(), None);
        assert_eq!(sessions.resolve("unknown").await.unwrap(), None);
    }
}

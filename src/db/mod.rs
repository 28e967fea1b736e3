//! Database layer
//!
//! SQLite is the persistent backend. Every store is reached through a
//! capability trait in `repositories`, which also provides an in-memory
//! implementation used by tests and by the `memory` driver.
//!
//! # Usage
//!
//! ```ignore
//! use conduit::config::DatabaseConfig;
//! use conduit::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod stores;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
pub use stores::Stores;

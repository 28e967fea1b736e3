//! Database repositories
//!
//! One capability trait per store, each with a SQLx implementation, plus
//! `MemoryRepository` implementing all of them in process.

pub mod article;
pub mod comment;
pub mod follow;
pub mod memory;
pub mod session;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowGraph, SqlxFollowGraph};
pub use memory::MemoryRepository;
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserDirectory, UserDirectory};

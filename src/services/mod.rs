//! Services layer - Business logic
//!
//! Services own the rules of the article subsystem:
//! - Ownership checks through `policy`
//! - Per-slug serialization of mutations through `SlugLocks`
//! - Filtering and paging through `query`
//! - Bounded calls to identity and follow-graph collaborators

pub mod article;
pub mod comment;
pub mod error;
pub mod lock;
pub mod lookup;
pub mod policy;
pub mod profile;
pub mod query;

pub use article::{generate_slug, ArticleService};
pub use comment::CommentService;
pub use error::{Resource, ServiceError, ServiceResult};
pub use lock::SlugLocks;
pub use profile::ProfileService;

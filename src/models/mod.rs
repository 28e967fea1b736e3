//! Data models
//!
//! Plain records shared by the stores, the services and the HTTP layer:
//! - Article and its create/patch/filter/pagination inputs
//! - Comment
//! - User profile and session

mod article;
mod comment;
mod session;
mod user;

pub use article::{
    normalize_tags, Article, ArticleFilter, ArticlePage, CreateArticleInput, NewArticle,
    Pagination, UpdateArticleInput,
};
pub use comment::{Comment, CreateCommentInput};
pub use session::Session;
pub use user::{Profile, UserId, UserProfile};

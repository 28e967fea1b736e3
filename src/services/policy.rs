//! Authorization policy
//!
//! The single place deciding who may change what. Services consult these
//! before every mutation.

use crate::models::{Article, Comment, UserId};

/// Only the author may edit or delete an article.
pub fn can_modify(caller: Option<UserId>, article: &Article) -> bool {
    caller == Some(article.author_id)
}

/// A comment may be removed by its own author or by the article's author.
pub fn can_delete_comment(caller: Option<UserId>, article: &Article, comment: &Comment) -> bool {
    caller == Some(comment.author_id) || can_modify(caller, article)
}

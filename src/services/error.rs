//! Service error taxonomy
//!
//! Every service operation fails with a `ServiceError`. Variants carry the
//! slug, comment id or field involved; turning them into wire messages is
//! left to the API layer.

use std::fmt;

/// The record a failure refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Article { slug: String },
    Comment { slug: String, id: i64 },
}

impl Resource {
    pub fn article(slug: impl Into<String>) -> Self {
        Resource::Article { slug: slug.into() }
    }

    pub fn comment(slug: impl Into<String>, id: i64) -> Self {
        Resource::Comment {
            slug: slug.into(),
            id,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Article { slug } => write!(f, "article '{}'", slug),
            Resource::Comment { slug, id } => write!(f, "comment {} on article '{}'", id, slug),
        }
    }
}

/// Error types for article, comment and profile operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A required field is missing or malformed
    #[error("Invalid {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// A pagination or filter parameter could not be parsed
    #[error("Invalid query parameter {param}: {value:?}")]
    InvalidQuery { param: &'static str, value: String },

    /// No caller identity where one is required
    #[error("Authentication required")]
    Unauthorized,

    /// Caller is known but not allowed to touch the resource
    #[error("Not permitted to modify {0}")]
    Forbidden(Resource),

    #[error("Not found: {0}")]
    NotFound(Resource),

    /// An identity or follow-graph lookup failed or timed out
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// A required text field was empty
    pub fn blank(field: &'static str) -> Self {
        ServiceError::InvalidInput {
            field,
            message: "can't be blank".to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

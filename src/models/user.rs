//! User model
//!
//! Accounts are managed elsewhere; this subsystem only reads the public
//! profile of an author and whether the caller follows them.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a user
pub type UserId = i64;

/// Directory record for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique identifier
    pub id: UserId,
    /// Username (unique)
    pub username: String,
    /// Short biography
    pub bio: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
}

impl UserProfile {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            bio: None,
            image: None,
        }
    }
}

/// Author identity as seen by a particular viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    /// Whether the viewer follows this user
    pub following: bool,
}

impl Profile {
    pub fn from_user(user: UserProfile, following: bool) -> Self {
        Self {
            username: user.username,
            bio: user.bio,
            image: user.image,
            following,
        }
    }
}

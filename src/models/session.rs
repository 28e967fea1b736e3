//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Issued access token bound to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token presented by clients
    pub token: String,
    /// Associated user ID
    pub user_id: UserId,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

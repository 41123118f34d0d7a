//! Session records stored in the shared cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Identity, Role};

/// Cache-resident record paired 1:1 with an issued bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session for an identity whose token expires at `expires_at`
    pub fn for_identity(identity: &Identity, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            created_at: Utc::now(),
            expires_at,
        }
    }
}

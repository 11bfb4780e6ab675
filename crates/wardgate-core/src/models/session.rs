//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session status. The only legal transition is `Active -> Inactive`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Inactive,
}

/// One authenticated device context for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    /// SHA-256 of the opaque refresh token; the raw value is only ever
    /// handed to the client.
    pub refresh_token_hash: String,
    /// Free-text device fingerprint, typically the user agent.
    pub device_info: String,
    pub ip_address: String,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Same device fingerprint and same originating address.
    pub fn matches_origin(&self, device_info: &str, ip_address: &str) -> bool {
        self.device_info == device_info && self.ip_address == ip_address
    }
}

/// Draft of a session to persist. The id is chosen by the caller so it
/// can be embedded in the access token before the record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token_hash: String,
    pub device_info: String,
    pub ip_address: String,
    pub expires_at: DateTime<Utc>,
}

//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user within their tenant. Carried in the access token's
/// `type` claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Patient,
    Doctor,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Patient => "patient",
            UserType::Doctor => "doctor",
            UserType::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: String,
    pub user_type: UserType,
}

/// The public view of a user returned alongside a fresh login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub user_type: UserType,
    pub tenant_id: Uuid,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            user_type: user.user_type,
            tenant_id: user.tenant_id,
        }
    }
}

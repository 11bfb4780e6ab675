//! Login credential checks.
//!
//! A login names a tenant, an email and a password. Lookup is confined
//! to the tenant, and the caller learns only whether a user matched, not
//! which of the two factors failed.

use argon2::password_hash::{Error as HashError, PasswordHash};
use argon2::{Argon2, PasswordVerifier};
use tracing::debug;
use uuid::Uuid;
use wardgate_core::error::{WardgateError, WardgateResult};
use wardgate_core::models::user::User;
use wardgate_core::repository::UserRepository;

use crate::error::AuthError;

/// Whether `password` matches the stored PHC string. The server pepper,
/// when configured, is prefixed exactly as the user store does when
/// hashing. Argon2 compares digests in constant time.
///
/// A stored hash that cannot be parsed is a `Crypto` error, never a
/// mismatch.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let stored = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("stored hash unreadable: {e}")))?;

    let candidate = match pepper {
        Some(p) => [p.as_bytes(), password.as_bytes()].concat(),
        None => password.as_bytes().to_vec(),
    };

    match Argon2::default().verify_password(&candidate, &stored) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("argon2: {e}"))),
    }
}

/// Checks an email/password pair against the user record of one tenant.
pub struct CredentialValidator<U: UserRepository> {
    users: U,
    pepper: Option<String>,
}

impl<U: UserRepository> CredentialValidator<U> {
    pub fn new(users: U, pepper: Option<String>) -> Self {
        Self { users, pepper }
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    /// Returns the user when both the lookup and the password check
    /// succeed, `None` otherwise.
    pub async fn validate(
        &self,
        email: &str,
        password: &str,
        tenant_id: Uuid,
    ) -> WardgateResult<Option<User>> {
        let user = match self.users.get_by_email(tenant_id, email).await {
            Ok(user) => user,
            Err(WardgateError::NotFound { .. }) => {
                debug!(tenant_id = %tenant_id, "no user for email");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if verify_password(password, &user.password_hash, self.pepper.as_deref())? {
            Ok(Some(user))
        } else {
            debug!(tenant_id = %tenant_id, user_id = %user.id, "password mismatch");
            Ok(None)
        }
    }
}

//! Authentication error types.

use thiserror::Error;
use wardgate_core::error::WardgateError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password deliberately share this variant.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("session is no longer active")]
    SessionInactive,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("misconfigured: {0}")]
    Config(String),
}

impl From<AuthError> for WardgateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Crypto(msg) => WardgateError::Crypto(msg),
            AuthError::Config(msg) => WardgateError::Internal(msg),
            other => WardgateError::AuthenticationFailed {
                reason: other.to_string(),
            },
        }
    }
}

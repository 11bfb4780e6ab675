//! Authentication and session-lifecycle configuration.

use std::time::Duration;

/// Configuration for the session lifecycle manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Session lifetime in seconds (default: 86_400 = 24 hours).
    pub session_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Minimum password length accepted on password change.
    pub min_password_length: usize,
    /// TTL of a user's active-session index entry (default: 24 hours).
    pub index_ttl_secs: u64,
    /// How long a revoked token stays blacklisted (default: 24 hours).
    pub blacklist_ttl_secs: u64,
    /// Upper bound on a single alert delivery attempt (default: 2 s).
    pub alert_timeout_ms: u64,
    /// Total delivery attempts per alert, inline attempt included.
    pub alert_max_attempts: u32,
    /// Delay before the n-th retry is `n * alert_retry_backoff_ms`.
    pub alert_retry_backoff_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "wardgate".into(),
            access_token_lifetime_secs: 900,
            session_lifetime_secs: 86_400,
            pepper: None,
            min_password_length: 12,
            index_ttl_secs: 86_400,
            blacklist_ttl_secs: 86_400,
            alert_timeout_ms: 2_000,
            alert_max_attempts: 3,
            alert_retry_backoff_ms: 5_000,
        }
    }
}

impl AuthConfig {
    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_timeout_ms)
    }

    pub fn alert_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.alert_retry_backoff_ms)
    }
}

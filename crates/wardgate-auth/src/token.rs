//! Session-bound credentials.
//!
//! Every session carries an EdDSA-signed access token naming its session
//! id (`sid`) and an opaque refresh token of which only the digest is
//! persisted. The same digest keys the token blacklist, so raw tokens
//! never reach the cache.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use wardgate_core::models::user::User;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject — user ID.
    pub sub: String,
    /// User type (`patient`, `doctor`, `admin`).
    #[serde(rename = "type")]
    pub user_type: String,
    pub tenant_id: String,
    /// Session the token belongs to.
    pub sid: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID; keeps two tokens minted in the same second
    /// distinct.
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid("malformed sub".into()))
    }

    pub fn session_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sid).map_err(|_| AuthError::TokenInvalid("malformed sid".into()))
    }

    pub fn tenant_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.tenant_id)
            .map_err(|_| AuthError::TokenInvalid("malformed tenant_id".into()))
    }
}

/// Mint the access token of session `session_id`. Lifetimes that do not
/// fit a timestamp are a configuration error.
pub fn issue_access_token(
    user: &User,
    session_id: Uuid,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        user_type: user.user_type.as_str().to_string(),
        tenant_id: user.tenant_id.to_string(),
        sid: session_id.to_string(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: i64::try_from(config.access_token_lifetime_secs)
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| AuthError::Config("access token lifetime out of range".into()))?,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;

    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Check signature, expiry and issuer of a presented access token and
/// return its claims. Whether the session behind it is still alive is
/// for the caller to decide.
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                AuthError::TokenExpired
            } else {
                AuthError::TokenInvalid(e.to_string())
            }
        })
}

/// Refresh token handed to the client at login: 256 random bits,
/// base64url without padding.
pub fn generate_refresh_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::rng().random::<[u8; 32]>())
}

/// Hex SHA-256 digest of a token. Stored in place of the refresh token
/// and used as the blacklist key of an access token.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

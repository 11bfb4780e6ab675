//! Server configuration from `WARDGATE_*` environment variables.
//!
//! Every variable is optional except the two JWT key files; unset ones
//! fall back to the library defaults.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use wardgate_auth::AuthConfig;
use wardgate_db::DbConfig;

/// Ten years. Longer lifetimes overflow timestamp arithmetic downstream.
const MAX_LIFETIME_SECS: u64 = 315_360_000;
const LIFETIME_SECS: RangeInclusive<u64> = 1..=MAX_LIFETIME_SECS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("cannot read {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    /// Interval between sweeps of expired cache entries.
    pub cache_sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut db = DbConfig::default();
        if let Some(url) = lookup("WARDGATE_DB_URL") {
            db.url = url;
        }
        if let Some(ns) = lookup("WARDGATE_DB_NAMESPACE") {
            db.namespace = ns;
        }
        if let Some(name) = lookup("WARDGATE_DB_DATABASE") {
            db.database = name;
        }
        if let Some(user) = lookup("WARDGATE_DB_USER") {
            db.username = Some(user);
        }
        if let Some(pass) = lookup("WARDGATE_DB_PASS") {
            db.password = Some(pass);
        }

        let mut auth = AuthConfig {
            jwt_private_key_pem: read_key(&lookup, "WARDGATE_JWT_PRIVATE_KEY_FILE")?,
            jwt_public_key_pem: read_key(&lookup, "WARDGATE_JWT_PUBLIC_KEY_FILE")?,
            pepper: lookup("WARDGATE_PEPPER"),
            ..AuthConfig::default()
        };
        if let Some(issuer) = lookup("WARDGATE_JWT_ISSUER") {
            auth.jwt_issuer = issuer;
        }
        parse_into(
            &lookup,
            "WARDGATE_ACCESS_TOKEN_LIFETIME_SECS",
            &mut auth.access_token_lifetime_secs,
            LIFETIME_SECS,
        )?;
        parse_into(
            &lookup,
            "WARDGATE_SESSION_LIFETIME_SECS",
            &mut auth.session_lifetime_secs,
            LIFETIME_SECS,
        )?;
        parse_into(
            &lookup,
            "WARDGATE_MIN_PASSWORD_LENGTH",
            &mut auth.min_password_length,
            1..=1024,
        )?;
        parse_into(&lookup, "WARDGATE_INDEX_TTL_SECS", &mut auth.index_ttl_secs, LIFETIME_SECS)?;
        parse_into(
            &lookup,
            "WARDGATE_BLACKLIST_TTL_SECS",
            &mut auth.blacklist_ttl_secs,
            LIFETIME_SECS,
        )?;
        parse_into(
            &lookup,
            "WARDGATE_ALERT_TIMEOUT_MS",
            &mut auth.alert_timeout_ms,
            1..=600_000,
        )?;
        parse_into(
            &lookup,
            "WARDGATE_ALERT_MAX_ATTEMPTS",
            &mut auth.alert_max_attempts,
            1..=20,
        )?;
        parse_into(
            &lookup,
            "WARDGATE_ALERT_RETRY_BACKOFF_MS",
            &mut auth.alert_retry_backoff_ms,
            0..=3_600_000,
        )?;

        let mut sweep_secs: u64 = 60;
        parse_into(&lookup, "WARDGATE_CACHE_SWEEP_SECS", &mut sweep_secs, 1..=86_400)?;

        Ok(Self {
            db,
            auth,
            cache_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn read_key<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = PathBuf::from(lookup(key).ok_or(ConfigError::Missing(key))?);
    std::fs::read_to_string(&path).map_err(|source| ConfigError::KeyFile { path, source })
}

/// Overwrite `slot` when `key` is set. Values outside `bounds` are
/// rejected like unparsable ones.
fn parse_into<F, T>(
    lookup: &F,
    key: &'static str,
    slot: &mut T,
    bounds: RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    match raw.trim().parse() {
        Ok(value) if bounds.contains(&value) => {
            *slot = value;
            Ok(())
        }
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

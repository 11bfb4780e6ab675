//! Active-session index and token blacklist.
//!
//! A derived, best-effort mirror of which sessions are active per user,
//! kept in a [`CacheStore`]. The session store stays authoritative; an
//! unreadable entry is treated as empty and overwritten on the next
//! write.
//!
//! Key scheme:
//! - `active-sessions:{user_id}` → JSON array of session ids
//! - `session-token:{session_id}` → access token
//! - `token-blacklist:{sha256(token)}` → marker
//!
//! Set updates are read-modify-write; callers serialise them per user.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;
use wardgate_core::cache::CacheStore;
use wardgate_core::error::{WardgateError, WardgateResult};

use crate::token::hash_token;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Lifetime of an `active-sessions` entry, refreshed on every write.
    pub entry_ttl: Duration,
    /// Lifetime of a blacklist entry.
    pub blacklist_ttl: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(86_400),
            blacklist_ttl: Duration::from_secs(86_400),
        }
    }
}

fn active_key(user_id: Uuid) -> String {
    format!("active-sessions:{user_id}")
}

fn token_key(session_id: Uuid) -> String {
    format!("session-token:{session_id}")
}

fn blacklist_key(token: &str) -> String {
    format!("token-blacklist:{}", hash_token(token))
}

pub struct ActiveSessionIndex<C: CacheStore> {
    cache: C,
    config: IndexConfig,
}

impl<C: CacheStore> ActiveSessionIndex<C> {
    pub fn new(cache: C, config: IndexConfig) -> Self {
        Self { cache, config }
    }

    /// Session ids currently believed active for `user_id`.
    pub async fn list(&self, user_id: Uuid) -> WardgateResult<BTreeSet<Uuid>> {
        let Some(raw) = self.cache.get(&active_key(user_id)).await? else {
            return Ok(BTreeSet::new());
        };
        match serde_json::from_str(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "discarding unreadable index entry");
                Ok(BTreeSet::new())
            }
        }
    }

    pub async fn add(&self, user_id: Uuid, session_id: Uuid) -> WardgateResult<()> {
        let mut ids = self.list(user_id).await?;
        if ids.insert(session_id) {
            self.write(user_id, &ids).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, user_id: Uuid, session_id: Uuid) -> WardgateResult<()> {
        let mut ids = self.list(user_id).await?;
        if ids.remove(&session_id) {
            self.write(user_id, &ids).await?;
        }
        Ok(())
    }

    /// Overwrite the user's set.
    pub async fn replace(&self, user_id: Uuid, ids: &BTreeSet<Uuid>) -> WardgateResult<()> {
        self.write(user_id, ids).await
    }

    pub async fn clear(&self, user_id: Uuid) -> WardgateResult<()> {
        self.cache.delete(&active_key(user_id)).await
    }

    /// Cache the access token of a session for `ttl`. A zero TTL drops
    /// the entry instead.
    pub async fn set_session_token(
        &self,
        session_id: Uuid,
        access_token: &str,
        ttl: Duration,
    ) -> WardgateResult<()> {
        if ttl.is_zero() {
            return self.drop_session_token(session_id).await;
        }
        self.cache
            .set_with_ttl(&token_key(session_id), access_token.to_string(), ttl)
            .await
    }

    pub async fn session_token(&self, session_id: Uuid) -> WardgateResult<Option<String>> {
        self.cache.get(&token_key(session_id)).await
    }

    pub async fn drop_session_token(&self, session_id: Uuid) -> WardgateResult<()> {
        self.cache.delete(&token_key(session_id)).await
    }

    /// Raw keyed write with an expiry in seconds.
    pub async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl_secs: u64,
    ) -> WardgateResult<()> {
        if ttl_secs == 0 {
            return Err(WardgateError::Validation {
                message: "ttl must be positive".into(),
            });
        }
        self.cache
            .set_with_ttl(key, value, Duration::from_secs(ttl_secs))
            .await
    }

    pub async fn get(&self, key: &str) -> WardgateResult<Option<String>> {
        self.cache.get(key).await
    }

    /// Deny `token` until the blacklist TTL lapses. Re-blacklisting
    /// restarts the clock.
    pub async fn blacklist(&self, token: &str) -> WardgateResult<()> {
        self.cache
            .set_with_ttl(&blacklist_key(token), "1".into(), self.config.blacklist_ttl)
            .await
    }

    pub async fn is_blacklisted(&self, token: &str) -> WardgateResult<bool> {
        Ok(self.cache.get(&blacklist_key(token)).await?.is_some())
    }

    async fn write(&self, user_id: Uuid, ids: &BTreeSet<Uuid>) -> WardgateResult<()> {
        let key = active_key(user_id);
        if ids.is_empty() {
            return self.cache.delete(&key).await;
        }
        let encoded = serde_json::to_string(ids)
            .map_err(|e| WardgateError::Internal(format!("index encode: {e}")))?;
        self.cache
            .set_with_ttl(&key, encoded, self.config.entry_ttl)
            .await
    }
}

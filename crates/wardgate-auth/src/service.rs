//! Session lifecycle manager: login reconciliation, logout, forced
//! logout and access verification.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wardgate_core::cache::CacheStore;
use wardgate_core::error::{WardgateError, WardgateResult};
use wardgate_core::models::session::{CreateSession, Session};
use wardgate_core::models::user::UserSummary;
use wardgate_core::repository::{SessionRepository, UserRepository};

use crate::alert::{AlertDispatcher, AlertFanout, AlertRetryQueue, FanoutReport, LoginAlert};
use crate::config::AuthConfig;
use crate::credentials::CredentialValidator;
use crate::error::AuthError;
use crate::index::{ActiveSessionIndex, IndexConfig};
use crate::locks::UserLocks;
use crate::token::{self, AccessTokenClaims};

const UNKNOWN: &str = "unknown";

/// Input for the login flow.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
    /// Device fingerprint, typically the user agent.
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginOutput {
    pub session_id: Uuid,
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token. Only its hash is stored.
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// Identity behind an accepted access token.
#[derive(Debug, Clone)]
pub struct VerifiedAccess {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub claims: AccessTokenClaims,
}

fn normalise(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Remaining lifetime of a session, zero once expired.
fn remaining(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Owns every mutation of a user's sessions.
///
/// Generic over the repositories, the cache and the alert transport so
/// the auth layer has no dependency on concrete backends. All mutating
/// operations for one user run under that user's lock.
pub struct SessionManager<U, S, C, A>
where
    U: UserRepository,
    S: SessionRepository,
    C: CacheStore,
    A: AlertDispatcher,
{
    credentials: CredentialValidator<U>,
    sessions: S,
    index: ActiveSessionIndex<C>,
    alerts: Arc<AlertFanout<A>>,
    locks: UserLocks,
    config: AuthConfig,
}

impl<U, S, C, A> SessionManager<U, S, C, A>
where
    U: UserRepository,
    S: SessionRepository,
    C: CacheStore,
    A: AlertDispatcher,
{
    pub fn new(users: U, sessions: S, cache: C, dispatcher: Arc<A>, config: AuthConfig) -> Self {
        let index = ActiveSessionIndex::new(
            cache,
            IndexConfig {
                entry_ttl: Duration::from_secs(config.index_ttl_secs),
                blacklist_ttl: Duration::from_secs(config.blacklist_ttl_secs),
            },
        );
        Self {
            credentials: CredentialValidator::new(users, config.pepper.clone()),
            sessions,
            index,
            alerts: Arc::new(AlertFanout::new(dispatcher, config.alert_timeout())),
            locks: UserLocks::new(),
            config,
        }
    }

    /// Queue failed alert deliveries for background redelivery.
    pub fn with_retry_queue(mut self, queue: AlertRetryQueue) -> Self {
        self.alerts = Arc::new(AlertFanout::clone(&self.alerts).with_retry_queue(queue));
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate and open a new session.
    ///
    /// Prior active sessions from the same device and address are
    /// retired without notice, as are sessions past their expiry. Every
    /// other active session stays alive and earns the owner one alert.
    /// The response waits for alert delivery at most one alert timeout.
    pub async fn login(&self, input: LoginInput) -> WardgateResult<LoginOutput> {
        let user = self
            .credentials
            .validate(&input.email, &input.password, input.tenant_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let device = normalise(input.device_info);
        let ip = normalise(input.ip_address);

        let expires_at = i64::try_from(self.config.session_lifetime_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| WardgateError::Internal("session lifetime out of range".into()))?;

        let session_id = Uuid::new_v4();
        let access_token = token::issue_access_token(&user, session_id, &self.config)?;
        let refresh_token = token::generate_refresh_token();

        let guard = self.locks.lock(user.id).await;

        let now = Utc::now();
        let active = self.sessions.list_active_for_user(user.id).await?;
        let (expired, current): (Vec<Session>, Vec<Session>) =
            active.into_iter().partition(|s| s.expires_at <= now);
        let (superseded, others): (Vec<Session>, Vec<Session>) = current
            .into_iter()
            .partition(|s| s.matches_origin(&device, &ip));

        for session in expired.iter().chain(&superseded) {
            self.retire(session).await?;
        }

        let alerts: Vec<LoginAlert> = others
            .iter()
            .map(|_| LoginAlert::new_login(&user, now, &device, &ip))
            .collect();

        let session = self
            .sessions
            .create(CreateSession {
                id: session_id,
                tenant_id: user.tenant_id,
                user_id: user.id,
                access_token: access_token.clone(),
                refresh_token_hash: token::hash_token(&refresh_token),
                device_info: device,
                ip_address: ip,
                expires_at,
            })
            .await?;

        let mut live: BTreeSet<Uuid> = others.iter().map(|s| s.id).collect();
        live.insert(session.id);
        self.index.replace(user.id, &live).await?;
        self.index
            .set_session_token(session.id, &access_token, remaining(session.expires_at))
            .await?;

        drop(guard);

        let report = self.dispatch_alerts(user.id, alerts).await;

        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            session_id = %session.id,
            expired = expired.len(),
            superseded = superseded.len(),
            concurrent = others.len(),
            alerts_delivered = report.map(|r| r.delivered),
            alerts_failed = report.map(|r| r.failed),
            "login"
        );

        Ok(LoginOutput {
            session_id: session.id,
            access_token,
            refresh_token,
            expires_at: session.expires_at,
            user: UserSummary::from(&user),
        })
    }

    /// End one session of `user_id`. Logging out an already inactive
    /// session succeeds without effect.
    pub async fn logout(&self, session_id: Uuid, user_id: Uuid) -> WardgateResult<()> {
        let _guard = self.locks.lock(user_id).await;

        let session = match self.sessions.get_by_id(session_id).await {
            Ok(s) if s.user_id == user_id => s,
            Ok(_) | Err(WardgateError::NotFound { .. }) => {
                return Err(WardgateError::not_found("session", session_id));
            }
            Err(e) => return Err(e),
        };

        if !session.is_active() {
            debug!(session_id = %session_id, "logout of inactive session");
            return Ok(());
        }

        self.retire(&session).await?;
        info!(user_id = %user_id, session_id = %session_id, "logout");
        Ok(())
    }

    /// End every active session of `user_id` and revoke their tokens.
    /// Returns how many sessions were ended.
    pub async fn force_logout_all(&self, user_id: Uuid) -> WardgateResult<u64> {
        let _guard = self.locks.lock(user_id).await;

        let active = self.sessions.list_active_for_user(user_id).await?;
        for session in &active {
            self.index.blacklist(&session.access_token).await?;
            self.index.drop_session_token(session.id).await?;
        }

        let ended = self.sessions.deactivate_all_for_user(user_id).await?;
        self.index.clear(user_id).await?;

        info!(user_id = %user_id, sessions = ended, "all sessions ended");
        Ok(ended)
    }

    pub async fn on_password_changed(&self, user_id: Uuid) -> WardgateResult<u64> {
        self.force_logout_all(user_id).await
    }

    /// Store a new password and end every session of the user.
    pub async fn change_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        new_password: &str,
    ) -> WardgateResult<u64> {
        if new_password.chars().count() < self.config.min_password_length {
            return Err(WardgateError::Validation {
                message: format!(
                    "password must be at least {} characters",
                    self.config.min_password_length
                ),
            });
        }

        self.credentials
            .users()
            .set_password(tenant_id, user_id, new_password)
            .await?;
        self.on_password_changed(user_id).await
    }

    /// Persist an externally prepared session and publish it.
    pub async fn create_session(&self, draft: CreateSession) -> WardgateResult<Session> {
        let _guard = self.locks.lock(draft.user_id).await;

        let session = self.sessions.create(draft).await?;
        self.index.add(session.user_id, session.id).await?;
        self.index
            .set_session_token(
                session.id,
                &session.access_token,
                remaining(session.expires_at),
            )
            .await?;

        debug!(user_id = %session.user_id, session_id = %session.id, "session published");
        Ok(session)
    }

    pub async fn list_active_sessions(&self, user_id: Uuid) -> WardgateResult<Vec<Session>> {
        self.sessions.list_active_for_user(user_id).await
    }

    /// Mark a session inactive. Repeating the call is harmless; an
    /// unknown id is `NotFound`.
    pub async fn deactivate_session(&self, session_id: Uuid) -> WardgateResult<()> {
        let session = self.sessions.get_by_id(session_id).await?;
        let _guard = self.locks.lock(session.user_id).await;

        if self.sessions.deactivate(session_id).await? {
            debug!(session_id = %session_id, "session deactivated");
        }
        self.index.remove(session.user_id, session_id).await?;
        self.index.drop_session_token(session_id).await
    }

    pub async fn invalidate_token(&self, access_token: &str) -> WardgateResult<()> {
        self.index.blacklist(access_token).await
    }

    pub async fn is_token_blacklisted(&self, access_token: &str) -> WardgateResult<bool> {
        self.index.is_blacklisted(access_token).await
    }

    /// Accept or reject a presented access token.
    ///
    /// Signature, expiry and issuer are checked first, then the
    /// blacklist. A session listed in the index is accepted directly;
    /// anything else is checked against the session store.
    pub async fn verify_access(&self, access_token: &str) -> WardgateResult<VerifiedAccess> {
        let claims = token::decode_access_token(access_token, &self.config)?;

        if self.index.is_blacklisted(access_token).await? {
            return Err(AuthError::TokenRevoked.into());
        }

        let user_id = claims.user_id()?;
        let session_id = claims.session_id()?;
        let tenant_id = claims.tenant_id()?;

        if !self.index.list(user_id).await?.contains(&session_id) {
            let session = match self.sessions.get_by_id(session_id).await {
                Ok(s) => s,
                Err(WardgateError::NotFound { .. }) => {
                    return Err(AuthError::SessionInactive.into());
                }
                Err(e) => return Err(e),
            };

            if !session.is_active() || session.user_id != user_id {
                return Err(AuthError::SessionInactive.into());
            }
            if session.expires_at <= Utc::now() {
                return Err(AuthError::TokenExpired.into());
            }
            if session.access_token != access_token {
                return Err(
                    AuthError::TokenInvalid("token does not belong to session".into()).into(),
                );
            }
            debug!(session_id = %session_id, "index miss, verified against store");
        }

        Ok(VerifiedAccess {
            user_id,
            tenant_id,
            session_id,
            claims,
        })
    }

    /// Hand login alerts to a background task and wait for it at most one
    /// alert timeout. `None` when it is still running or died.
    async fn dispatch_alerts(
        &self,
        user_id: Uuid,
        alerts: Vec<LoginAlert>,
    ) -> Option<FanoutReport> {
        if alerts.is_empty() {
            return Some(FanoutReport::default());
        }

        let fanout = Arc::clone(&self.alerts);
        let delivery = tokio::spawn(async move {
            let report = fanout.deliver_all(alerts).await;
            if report.failed > 0 {
                warn!(
                    user_id = %user_id,
                    failed = report.failed,
                    queued = report.queued,
                    "login alerts not delivered"
                );
            }
            report
        });

        match tokio::time::timeout(self.config.alert_timeout(), delivery).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!(user_id = %user_id, error = %e, "alert delivery task failed");
                None
            }
            Err(_) => {
                debug!(user_id = %user_id, "alert delivery continues in background");
                None
            }
        }
    }

    /// Deactivate, unpublish and revoke one session.
    async fn retire(&self, session: &Session) -> WardgateResult<()> {
        self.sessions.deactivate(session.id).await?;
        self.index.remove(session.user_id, session.id).await?;
        self.index.drop_session_token(session.id).await?;
        self.index.blacklist(&session.access_token).await
    }
}

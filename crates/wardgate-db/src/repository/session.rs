//! SurrealDB implementation of [`SessionRepository`].
//!
//! Sessions are never deleted. Deactivation only ever matches rows that
//! are still `Active`, so the status can not flip back.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use wardgate_core::error::WardgateResult;
use wardgate_core::models::session::{CreateSession, Session, SessionStatus};
use wardgate_core::repository::SessionRepository;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct SessionRow {
    tenant_id: String,
    user_id: String,
    access_token: String,
    refresh_token_hash: String,
    device_info: String,
    ip_address: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    tenant_id: String,
    user_id: String,
    access_token: String,
    refresh_token_hash: String,
    device_info: String,
    ip_address: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
}

fn parse_status(s: &str) -> Result<SessionStatus, DbError> {
    match s {
        "Active" => Ok(SessionStatus::Active),
        "Inactive" => Ok(SessionStatus::Inactive),
        other => Err(DbError::Decode(format!("unknown session status: {other}"))),
    }
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<Session, DbError> {
        Ok(Session {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            access_token: self.access_token,
            refresh_token_hash: self.refresh_token_hash,
            device_info: self.device_info,
            ip_address: self.ip_address,
            status: parse_status(&self.status)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
            deactivated_at: self.deactivated_at,
        })
    }
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        let id = parse_uuid("session", &self.record_id)?;
        SessionRow {
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            access_token: self.access_token,
            refresh_token_hash: self.refresh_token_hash,
            device_info: self.device_info,
            ip_address: self.ip_address,
            status: self.status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            deactivated_at: self.deactivated_at,
        }
        .into_session(id)
    }
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> WardgateResult<Session> {
        let id = input.id;
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 tenant_id = $tenant_id, \
                 user_id = $user_id, \
                 access_token = $access_token, \
                 refresh_token_hash = $refresh_token_hash, \
                 device_info = $device_info, \
                 ip_address = $ip_address, \
                 status = 'Active', \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("access_token", input.access_token))
            .bind(("refresh_token_hash", input.refresh_token_hash))
            .bind(("device_info", input.device_info))
            .bind(("ip_address", input.ip_address))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        debug!(session_id = %id, user_id = %input.user_id, "session created");
        Ok(row.into_session(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardgateResult<Session> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('session', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> WardgateResult<Vec<Session>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE user_id = $user_id AND status = 'Active' \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;

        let sessions = rows
            .into_iter()
            .map(|row| row.try_into_session())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(sessions)
    }

    async fn deactivate(&self, id: Uuid) -> WardgateResult<bool> {
        let result = self
            .db
            .query(
                "UPDATE type::record('session', $id) SET \
                 status = 'Inactive', deactivated_at = time::now() \
                 WHERE status = 'Active'",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;

        let changed = !rows.is_empty();
        if changed {
            debug!(session_id = %id, "session deactivated");
        }
        Ok(changed)
    }

    async fn deactivate_all_for_user(&self, user_id: Uuid) -> WardgateResult<u64> {
        let result = self
            .db
            .query(
                "UPDATE session SET \
                 status = 'Inactive', deactivated_at = time::now() \
                 WHERE user_id = $user_id AND status = 'Active'",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;

        debug!(user_id = %user_id, count = rows.len(), "user sessions deactivated");
        Ok(rows.len() as u64)
    }
}

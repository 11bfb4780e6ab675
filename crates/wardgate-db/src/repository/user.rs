//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time; it must match the one the auth
//! layer verifies with.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use wardgate_core::error::WardgateResult;
use wardgate_core::models::user::{CreateUser, User, UserType};
use wardgate_core::repository::UserRepository;

use crate::error::{DbError, parse_uuid, write_rejected};

const EMAIL_INDEX: &str = "idx_user_tenant_email";

/// Row for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    tenant_id: String,
    email: String,
    name: String,
    phone: Option<String>,
    password_hash: String,
    user_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    tenant_id: String,
    email: String,
    name: String,
    phone: Option<String>,
    password_hash: String,
    user_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

fn parse_user_type(s: &str) -> Result<UserType, DbError> {
    match s {
        "patient" => Ok(UserType::Patient),
        "doctor" => Ok(UserType::Doctor),
        "admin" => Ok(UserType::Admin),
        other => Err(DbError::Decode(format!("unknown user type: {other}"))),
    }
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            email: self.email,
            name: self.name,
            phone: self.phone,
            password_hash: self.password_hash,
            user_type: parse_user_type(&self.user_type)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = parse_uuid("user", &self.record_id)?;
        UserRow {
            tenant_id: self.tenant_id,
            email: self.email,
            name: self.name,
            phone: self.phone,
            password_hash: self.password_hash,
            user_type: self.user_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::PasswordHash(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::PasswordHash(e.to_string()))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn tenant_exists(&self, tenant_id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM type::record('tenant', $id)")
            .bind(("id", tenant_id.to_string()))
            .await?;
        let rows: Vec<IdRow> = result.take(0)?;
        Ok(!rows.is_empty())
    }

    async fn email_taken(&self, tenant_id: Uuid, email: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM user \
                 WHERE tenant_id = $tenant_id AND email = $email",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email", email.to_string()))
            .await?;
        let rows: Vec<IdRow> = result.take(0)?;
        Ok(!rows.is_empty())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> WardgateResult<User> {
        if !self.tenant_exists(input.tenant_id).await? {
            return Err(DbError::NotFound {
                entity: "tenant".into(),
                id: input.tenant_id.to_string(),
            }
            .into());
        }
        // Fast path; concurrent creates are caught by the unique index.
        if self.email_taken(input.tenant_id, &input.email).await? {
            return Err(DbError::Conflict {
                entity: "user".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 email = $email, name = $name, phone = $phone, \
                 password_hash = $password_hash, \
                 user_type = $user_type",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("email", input.email))
            .bind(("name", input.name))
            .bind(("phone", input.phone))
            .bind(("password_hash", password_hash))
            .bind(("user_type", input.user_type.as_str().to_string()))
            .await
            .map_err(|e| match write_rejected(e.to_string(), EMAIL_INDEX, "user") {
                conflict @ DbError::Conflict { .. } => conflict,
                _ => DbError::from(e),
            })?;

        let mut result = result
            .check()
            .map_err(|e| write_rejected(e.to_string(), EMAIL_INDEX, "user"))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        debug!(user_id = %id, tenant_id = %input.tenant_id, "user created");
        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> WardgateResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('user', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> WardgateResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id AND email = $email",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password: &str,
    ) -> WardgateResult<User> {
        let id_str = id.to_string();
        let password_hash = hash_password(password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 password_hash = $password_hash, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        debug!(user_id = %id, "password updated");
        Ok(row.into_user(id)?)
    }
}

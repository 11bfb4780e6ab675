//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use wardgate_core::error::WardgateResult;
use wardgate_core::models::tenant::{CreateTenant, Tenant};
use wardgate_core::repository::TenantRepository;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Tenant {
        Tenant {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> WardgateResult<Tenant> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, email = $email, phone = $phone",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id))
    }

    async fn get_by_id(&self, id: Uuid) -> WardgateResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id))
    }
}

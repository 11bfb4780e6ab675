//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings; enums are stored as strings guarded by ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "tenants_users_sessions",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = "\
-- Tenants
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD email ON TABLE tenant TYPE option<string>;
DEFINE FIELD phone ON TABLE tenant TYPE option<string>;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();

-- Users (tenant scope)
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD phone ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD user_type ON TABLE user TYPE string \
    ASSERT $value IN ['patient', 'doctor', 'admin'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;

-- Sessions
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string \
    READONLY;
DEFINE FIELD user_id ON TABLE session TYPE string \
    READONLY;
DEFINE FIELD access_token ON TABLE session TYPE string;
DEFINE FIELD refresh_token_hash ON TABLE session TYPE string;
DEFINE FIELD device_info ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE string;
DEFINE FIELD status ON TABLE session TYPE string \
    ASSERT $value IN ['Active', 'Inactive'];
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD deactivated_at ON TABLE session TYPE option<datetime>;
DEFINE INDEX idx_session_access_token ON TABLE session \
    COLUMNS access_token UNIQUE;
DEFINE INDEX idx_session_refresh_token ON TABLE session \
    COLUMNS refresh_token_hash UNIQUE;
DEFINE INDEX idx_session_user_status ON TABLE session \
    COLUMNS user_id, status;
";

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the recorded maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
    {
        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn fresh_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = fresh_db().await;
    wardgate_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    for table in ["tenant", "user", "session", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = fresh_db().await;

    wardgate_db::run_migrations(&db).await.unwrap();
    wardgate_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn session_status_rejects_unknown_values() {
    let db = fresh_db().await;
    wardgate_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE session SET \
             tenant_id = 't', user_id = 'u', \
             access_token = 'a', refresh_token_hash = 'r', \
             device_info = 'd', ip_address = 'i', \
             status = 'Suspended', expires_at = time::now()",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown status should be rejected");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_access_tokens() {
    let db = fresh_db().await;
    wardgate_db::run_migrations(&db).await.unwrap();

    let create = |refresh: &'static str| {
        format!(
            "CREATE session SET \
             tenant_id = 't', user_id = 'u', \
             access_token = 'same-token', refresh_token_hash = '{refresh}', \
             device_info = 'd', ip_address = 'i', \
             status = 'Active', expires_at = time::now()"
        )
    };

    db.query(create("r1")).await.unwrap().check().unwrap();
    let result = db.query(create("r2")).await.unwrap().check();

    assert!(result.is_err(), "duplicate access token should be rejected");
}

//! Integration tests for the Tenant and User repositories using
//! in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use wardgate_core::error::WardgateError;
use wardgate_core::models::tenant::CreateTenant;
use wardgate_core::models::user::{CreateUser, UserType};
use wardgate_core::repository::{TenantRepository, UserRepository};
use wardgate_db::repository::{SurrealTenantRepository, SurrealUserRepository};

/// Helper: spin up in-memory DB, run migrations, create one tenant.
async fn setup() -> (Surreal<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    wardgate_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "St. Mary's".into(),
            email: Some("admin@stmarys.example".into()),
            phone: None,
        })
        .await
        .unwrap();

    (db, tenant.id)
}

fn new_user(tenant_id: Uuid, email: &str) -> CreateUser {
    CreateUser {
        tenant_id,
        email: email.into(),
        name: "Alice".into(),
        phone: None,
        password: "correct-horse-battery".into(),
        user_type: UserType::Doctor,
    }
}

#[tokio::test]
async fn create_and_get_tenant() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo.get_by_id(tenant_id).await.unwrap();
    assert_eq!(tenant.name, "St. Mary's");
    assert_eq!(tenant.email.as_deref(), Some("admin@stmarys.example"));

    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardgateError::NotFound { .. }));
}

#[tokio::test]
async fn create_and_get_user() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo.create(new_user(tenant_id, "a@x.com")).await.unwrap();

    assert_eq!(user.tenant_id, tenant_id);
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.user_type, UserType::Doctor);
    assert_ne!(user.password_hash, "correct-horse-battery");
    assert!(user.password_hash.starts_with("$argon2id$"));

    let by_id = repo.get_by_id(tenant_id, user.id).await.unwrap();
    assert_eq!(by_id.id, user.id);

    let by_email = repo.get_by_email(tenant_id, "a@x.com").await.unwrap();
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn create_user_requires_existing_tenant() {
    let (db, _) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let err = repo
        .create(new_user(Uuid::new_v4(), "a@x.com"))
        .await
        .unwrap_err();

    match err {
        WardgateError::NotFound { entity, .. } => assert_eq!(entity, "tenant"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_email_within_tenant_conflicts() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    repo.create(new_user(tenant_id, "a@x.com")).await.unwrap();
    let err = repo
        .create(new_user(tenant_id, "a@x.com"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, WardgateError::AlreadyExists { .. }),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn same_email_in_other_tenant_is_a_distinct_user() {
    let (db, tenant_a) = setup().await;
    let tenant_b = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "General".into(),
            email: None,
            phone: None,
        })
        .await
        .unwrap()
        .id;
    let repo = SurrealUserRepository::new(db);

    let a = repo.create(new_user(tenant_a, "a@x.com")).await.unwrap();
    let b = repo.create(new_user(tenant_b, "a@x.com")).await.unwrap();
    assert_ne!(a.id, b.id);

    assert_eq!(repo.get_by_email(tenant_a, "a@x.com").await.unwrap().id, a.id);
    assert_eq!(repo.get_by_email(tenant_b, "a@x.com").await.unwrap().id, b.id);
}

#[tokio::test]
async fn lookups_are_tenant_scoped() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo.create(new_user(tenant_id, "a@x.com")).await.unwrap();

    let other = Uuid::new_v4();
    assert!(repo.get_by_id(other, user.id).await.is_err());
    assert!(repo.get_by_email(other, "a@x.com").await.is_err());
}

#[tokio::test]
async fn set_password_rehashes() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo.create(new_user(tenant_id, "a@x.com")).await.unwrap();

    let updated = repo
        .set_password(tenant_id, user.id, "a-brand-new-passphrase")
        .await
        .unwrap();

    assert_ne!(updated.password_hash, user.password_hash);
    assert!(updated.password_hash.starts_with("$argon2id$"));
    assert!(updated.updated_at >= user.updated_at);
}

#[tokio::test]
async fn set_password_for_missing_user_is_not_found() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let err = repo
        .set_password(tenant_id, Uuid::new_v4(), "whatever-password")
        .await
        .unwrap_err();
    assert!(matches!(err, WardgateError::NotFound { .. }));
}

#[tokio::test]
async fn racing_creates_with_same_email_leave_one_user() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealUserRepository::new(db);

    let (first, second) = tokio::join!(
        repo.create(new_user(tenant_id, "race@x.com")),
        repo.create(new_user(tenant_id, "race@x.com")),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        // Losing either the pre-check or the index race is a conflict;
        // an engine-level write conflict is at worst retryable.
        assert!(
            matches!(err, WardgateError::AlreadyExists { .. }) || err.is_retryable(),
            "unexpected error: {err:?}"
        );
    }

    let stored = repo.get_by_email(tenant_id, "race@x.com").await.unwrap();
    assert_eq!(stored.email, "race@x.com");
}

//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Where the durable session store lives.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket endpoint (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials. `None` connects without signing in, which only
    /// works against a server started with authentication disabled.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "wardgate".into(),
            database: "sessions".into(),
            username: Some("root".into()),
            password: Some("root".into()),
        }
    }
}

/// Owns the connection shared by every repository.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect, optionally sign in as root, then select the configured
    /// namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "connecting to session store"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.clone(),
                password: password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    /// Handle for constructing repositories. Cheap to clone.
    pub fn client(&self) -> Surreal<Client> {
        self.db.clone()
    }
}

//! Wardgate — session lifecycle service entry point.

mod config;

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wardgate_auth::{LogAlertDispatcher, RetryPolicy, SessionManager, spawn_retry_worker};
use wardgate_cache::MemoryCache;
use wardgate_db::repository::{SurrealSessionRepository, SurrealUserRepository};
use wardgate_db::{DbError, DbManager};

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
enum ServerError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("session store: {0}")]
    Db(#[from] DbError),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wardgate=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "wardgate failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    info!("starting wardgate");

    let config = ServerConfig::from_env()?;

    let db = DbManager::connect(&config.db).await?;
    db.migrate().await?;

    let users = match config.auth.pepper.clone() {
        Some(pepper) => SurrealUserRepository::with_pepper(db.client(), pepper),
        None => SurrealUserRepository::new(db.client()),
    };
    let sessions = SurrealSessionRepository::new(db.client());
    let cache = MemoryCache::new();
    let dispatcher = Arc::new(LogAlertDispatcher);

    let (retry_queue, retry_worker) = spawn_retry_worker(
        dispatcher.clone(),
        RetryPolicy {
            max_attempts: config.auth.alert_max_attempts,
            backoff: config.auth.alert_retry_backoff(),
            timeout: config.auth.alert_timeout(),
        },
    );

    let manager = SessionManager::new(users, sessions, cache.clone(), dispatcher, config.auth)
        .with_retry_queue(retry_queue);

    let sweeper = {
        let cache = cache.clone();
        let mut tick = tokio::time::interval(config.cache_sweep_interval);
        tokio::spawn(async move {
            loop {
                tick.tick().await;
                cache.purge_expired();
            }
        })
    };

    info!(
        issuer = %manager.config().jwt_issuer,
        session_lifetime_secs = manager.config().session_lifetime_secs,
        "wardgate ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    sweeper.abort();
    drop(manager);
    if let Err(e) = retry_worker.await {
        error!(error = %e, "alert retry worker aborted");
    }

    info!("wardgate stopped");
    Ok(())
}

//! Wardgate Database — SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Implementations of the `wardgate-core` repository traits
//!   ([`repository`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;

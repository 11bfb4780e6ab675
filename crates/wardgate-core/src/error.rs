//! Error types for the Wardgate system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardgateError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Tenant context missing or invalid")]
    TenantContext,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardgateError {
    /// Shorthand for a missing record.
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Backend failures leave no half-applied state that a retry of the
    /// same operation cannot repair.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cache(_))
    }

    /// Whether the failure should be reported to the caller as a
    /// rejection of their request rather than as a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::AuthenticationFailed { .. }
                | Self::Validation { .. }
                | Self::TenantContext
        )
    }
}

pub type WardgateResult<T> = Result<T, WardgateError>;

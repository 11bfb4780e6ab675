//! Database-specific error types and conversions.

use wardgate_core::error::WardgateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    Conflict { entity: String },
}

impl From<DbError> for WardgateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardgateError::NotFound { entity, id },
            DbError::Conflict { entity } => WardgateError::AlreadyExists { entity },
            DbError::PasswordHash(msg) => WardgateError::Crypto(msg),
            other => WardgateError::Database(other.to_string()),
        }
    }
}

/// Classify a rejected write. A violation of `unique_index` becomes a
/// conflict on `entity`; anything else stays a query error.
pub(crate) fn write_rejected(message: String, unique_index: &str, entity: &str) -> DbError {
    if message.contains(unique_index) && message.contains("already contains") {
        DbError::Conflict {
            entity: entity.into(),
        }
    } else {
        DbError::Query(message)
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_already_exists() {
        let err: WardgateError = DbError::Conflict {
            entity: "user".into(),
        }
        .into();
        assert!(matches!(err, WardgateError::AlreadyExists { entity } if entity == "user"));
    }

    #[test]
    fn decode_failure_is_a_store_failure() {
        let err: WardgateError = DbError::Decode("bad".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn unique_index_violation_is_a_conflict() {
        let message = "Database index `idx_user_tenant_email` already contains \
                       ['6f1c…', 'a@x.com'], with record `user:⟨b2d0…⟩`"
            .to_string();
        let err: WardgateError = write_rejected(message, "idx_user_tenant_email", "user").into();
        assert!(matches!(err, WardgateError::AlreadyExists { ref entity } if entity == "user"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_rejections_stay_query_errors() {
        let err = write_rejected(
            "Found 'nurse' for field `user_type`".into(),
            "idx_user_tenant_email",
            "user",
        );
        assert!(matches!(err, DbError::Query(_)));
    }

    #[test]
    fn parse_uuid_reports_field() {
        let err = parse_uuid("tenant", "nope").unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}

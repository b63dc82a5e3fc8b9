//! Database-specific error types and conversions.

use goma_core::error::GomaError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    UniqueViolation { entity: String },

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Raised with `THROW` when a guarded statement finds its target missing.
pub(crate) const THROWN_NOT_FOUND: &str = "goma:not_found";

/// Raised with `THROW` when a guarded delete finds dependent records.
pub(crate) const THROWN_IN_USE: &str = "goma:in_use";

impl DbError {
    /// Classify a failed statement. Unique index violations are reported
    /// by SurrealDB as "Database index `...` already contains ...".
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::UniqueViolation {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    /// `true` if `err` carries a marker raised by a `THROW` in our own
    /// statements.
    pub(crate) fn is_thrown(err: &surrealdb::Error, marker: &str) -> bool {
        err.to_string().contains(marker)
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for GomaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GomaError::NotFound { entity, id },
            DbError::UniqueViolation { entity } => GomaError::AlreadyExists { entity },
            DbError::Conflict(message) => GomaError::Conflict(message),
            other => GomaError::Database(other.to_string()),
        }
    }
}

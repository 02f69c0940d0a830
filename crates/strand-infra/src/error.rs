//! Infrastructure client errors

use thiserror::Error;

/// Errors that can occur when talking to the database, broker or migration engine
#[derive(Debug, Error)]
pub enum InfraError {
    /// Database query or connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A referenced row (tenant, stream) does not exist yet
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Broker admin call failed
    #[error("Broker error: {0}")]
    Broker(String),

    /// Migration engine failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Endpoint refused or dropped the connection
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// Operation did not complete within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Connection string could not be parsed
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// Password generation or hashing failed
    #[error("Password error: {0}")]
    Password(String),
}

impl InfraError {
    /// Whether the error means a referenced row is missing rather than a broken backend.
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::MissingDependency(_) | Self::NotFound(_))
    }
}

/// Postgres SQLSTATE for foreign key violations
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Map a foreign key violation to [`InfraError::MissingDependency`].
pub(crate) fn classify(err: sqlx::Error, what: &str) -> InfraError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().is_some_and(|code| code == FOREIGN_KEY_VIOLATION) {
            return InfraError::MissingDependency(format!("{what}: {}", db_err.message()));
        }
    }
    InfraError::Database(err)
}

//! Database error types
//!
//! Errors raised by the PostgreSQL adapter, and their translation into the
//! [`PortError`] the ledger services understand.

use thiserror::Error;

use core_kernel::PortError;

/// PostgreSQL SQLSTATE codes the adapter distinguishes
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const QUERY_CANCELED: &str = "57014";
}

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The server aborted the transaction; it may be retried as a whole
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value does not map back to a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Sale", "0190c1d2");
    /// assert!(error.to_string().contains("Sale"));
    /// ```
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Maps a SQLSTATE code and server message to a variant
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            sqlstate::UNIQUE_VIOLATION => DatabaseError::DuplicateEntry(message),
            sqlstate::FOREIGN_KEY_VIOLATION => DatabaseError::ForeignKeyViolation(message),
            sqlstate::CHECK_VIOLATION => DatabaseError::ConstraintViolation(message),
            sqlstate::SERIALIZATION_FAILURE
            | sqlstate::DEADLOCK_DETECTED
            | sqlstate::LOCK_NOT_AVAILABLE
            | sqlstate::QUERY_CANCELED => DatabaseError::TransactionFailed(message),
            _ => DatabaseError::QueryFailed(message),
        }
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::not_found("Record", "?"),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) => DatabaseError::from_sqlstate(code.as_ref(), db_err.message()),
                None => DatabaseError::QueryFailed(db_err.message().to_string()),
            },
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::TransactionFailed(message) => PortError::aborted(message),
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::timeout("waiting for a pooled connection"),
            other => PortError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

/// Shorthand used by the adapter for every query
pub(crate) fn db_to_port_error(error: sqlx::Error) -> PortError {
    PortError::from(DatabaseError::from(&error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn unknown_sqlstates_are_never_retried(code in "[0-9A-Z]{5}") {
            prop_assume!(!code.starts_with("23") && !["40001", "40P01", "55P03", "57014"].contains(&code.as_str()));
            let port = PortError::from(DatabaseError::from_sqlstate(&code, "boom"));
            prop_assert!(!port.is_transient());
        }
    }

    #[test]
    fn test_serialization_failures_are_retryable() {
        for code in ["40001", "40P01", "55P03", "57014"] {
            let error = DatabaseError::from_sqlstate(code, "could not serialize access");
            assert!(matches!(error, DatabaseError::TransactionFailed(_)));
            assert!(PortError::from(error).is_transient());
        }
    }

    #[test]
    fn test_unique_violation_is_a_conflict() {
        let error = DatabaseError::from_sqlstate("23505", "returns_one_requested_per_sale");
        assert!(error.is_constraint_violation());
        assert!(matches!(PortError::from(error), PortError::Conflict { .. }));
    }

    #[test]
    fn test_check_violation_is_terminal() {
        let port = PortError::from(DatabaseError::from_sqlstate("23514", "sales_check"));
        assert!(matches!(port, PortError::Internal { .. }));
        assert!(!port.is_transient());
    }

    #[test]
    fn test_not_found_keeps_entity() {
        let port = PortError::from(DatabaseError::not_found("PurchaseOrder", "abc"));
        assert!(port.is_not_found());
        assert!(port.to_string().contains("PurchaseOrder"));
    }

    #[test]
    fn test_pool_errors_are_connection_errors() {
        let error = DatabaseError::from(&sqlx::Error::PoolTimedOut);
        assert!(error.is_connection_error());

        let port = PortError::from(error);
        assert!(matches!(port, PortError::Timeout { .. }));
        assert!(port.is_transient());
    }
}

//! Error types for the document store.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection or pool failure.
    #[error("store connection failed: {0}")]
    Connection(String),

    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A compare-and-set update kept losing races and gave up.
    #[error("conflicting concurrent updates on document: {0}")]
    Conflict(String),

    /// Document is not valid JSON or misses required fields.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Migration failure.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Query execution failure.
    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                StoreError::NotFound("no matching row".to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Migrate(e) => StoreError::Migration(e.to_string()),
            err => StoreError::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(StoreError::NotFound("x".to_string()).is_not_found());
        assert!(!StoreError::Conflict("x".to_string()).is_not_found());
    }

    #[test]
    fn test_sqlx_row_not_found_conversion() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }
}

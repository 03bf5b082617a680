//! Custom error types for xload.
//!
//! Covers the three failure classes the loader distinguishes: malformed
//! input records, usage errors caught before any database round-trip, and
//! storage failures propagated from the driver below.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for xload operations.
#[derive(Error, Debug)]
pub enum LoadError {
    // =========================================================================
    // Archive Errors
    // =========================================================================
    /// Input archive missing or unreadable.
    #[error("Failed to open archive '{path}': {source}")]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive exists but is not a readable zip file.
    #[error("Invalid archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    // =========================================================================
    // Record Errors
    // =========================================================================
    /// Record line is not valid JSON or not an object.
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// A field the normalizer cannot substitute a default for is absent.
    #[error("Record is missing required field '{field}'")]
    MissingField { field: &'static str },

    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// A grouped insert was built over zero rows.
    #[error("Bulk insert into '{table}' requires at least one row")]
    EmptyRowSet { table: &'static str },

    /// Batch assembly was requested with a zero batch size.
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    // =========================================================================
    // Storage / IO Errors
    // =========================================================================
    /// Database operation failed; the enclosing transaction is rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped anyhow error from the binary edge.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for xload operations.
pub type Result<T> = std::result::Result<T, LoadError>;

impl LoadError {
    /// Create a malformed record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Create a missing required field error.
    #[must_use]
    pub const fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

#[cfg(test)]
mod tests {
    use super::LoadError;

    #[test]
    fn error_messages_name_the_offender() {
        let err = LoadError::missing("user.id");
        assert_eq!(
            err.to_string(),
            "Record is missing required field 'user.id'"
        );

        let err = LoadError::EmptyRowSet { table: "tweet_tags" };
        assert!(err.to_string().contains("tweet_tags"));

        let err = LoadError::malformed("expected object");
        assert!(err.to_string().contains("expected object"));
    }
}

//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The underlying `sqlx` error is always attached as a
//! child, so the kind only has to say *where* things went wrong.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database could not be opened, created or migrated.
    #[display("failed to open asset database")]
    Init,
    /// A read or write failed. Writes are never silently dropped: if this is
    /// returned, nothing from the operation was committed.
    #[display("database {op} on `{table}` failed")]
    Io { table: &'static str, op: &'static str },
    /// A stored value could not be converted back into its model.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The store was never initialized, or has been closed.
    #[display("asset database is not open")]
    Closed,
}

impl ErrorKind {
    pub(crate) fn io(table: &'static str, op: &'static str) -> Self {
        Self::Io { table, op }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Mostly SQLITE_BUSY once the busy timeout has elapsed.
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::io("files", "insert").to_string(), "database insert on `files` failed");
        assert_eq!(ErrorKind::InvalidData("created_at").to_string(), "invalid stored data: created_at");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::io("metadata", "select").is_retryable());
        assert!(!ErrorKind::Init.is_retryable());
        assert!(!ErrorKind::Closed.is_retryable());
    }
}

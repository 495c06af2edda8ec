//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source could not be read or did not match the expected shape; the
    /// figment error naming the offending key is attached as a child.
    #[display("failed to load configuration")]
    Load,
    #[display("invalid configuration: `{key}` {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

//! Registry Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Store and importer failures keep their own kind, wrapped
//! in [`ErrorKind::Store`] or [`ErrorKind::Import`], with the original tree
//! attached as a child.

use derive_more::{Display, Error};
use exn::ResultExt;

/// A registry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Called before [`Registry::initialize`](crate::Registry::initialize)
    /// completed, or after [`Registry::close`](crate::Registry::close).
    #[display("asset registry is not initialized")]
    NotInitialized,
    /// Only raised by deletes; lookups return `None` instead.
    #[display("asset `{_0}` not found")]
    NotFound(#[error(not(source))] String),
    #[display("{_0}")]
    Store(#[error(not(source))] hoard_store::error::ErrorKind),
    #[display("{_0}")]
    Import(#[error(not(source))] hoard_import::error::ErrorKind),
    /// A blocking decode task panicked or was cancelled.
    #[display("import task did not complete")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(kind) => kind.is_retryable(),
            Self::Import(kind) => kind.is_retryable(),
            Self::NotInitialized | Self::NotFound(_) | Self::Task => false,
        }
    }
}

/// Lift a store or importer result into the registry's taxonomy.
pub(crate) trait Propagate<T> {
    fn propagate(self) -> Result<T>;
}
impl<T> Propagate<T> for hoard_store::error::Result<T> {
    fn propagate(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::Store(*err);
                Err(err).or_raise(|| kind)
            },
        }
    }
}
impl<T> Propagate<T> for hoard_import::error::Result<T> {
    fn propagate(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::Import((*err).clone());
                Err(err).or_raise(|| kind)
            },
        }
    }
}

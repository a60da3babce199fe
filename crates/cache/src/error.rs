//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backing store is unreachable or a query failed.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A stored value could not be converted to its model type.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// A cache driver name outside the fixed enumeration.
    #[display("unknown cache driver: {_0}")]
    UnknownDriver(#[error(not(source))] String),
    /// A cache method name outside the fixed enumeration.
    #[display("unknown cache method: {_0}")]
    UnknownMethod(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A store outage is transient; the scheduler pass that hit it aborts
        // cleanly and the next period retries.
        matches!(self, Self::Database)
    }
}

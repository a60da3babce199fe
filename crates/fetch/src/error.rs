//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The retryable/terminal split drives the worker's backoff decisions: a
/// flaky upstream earns another attempt, a malformed or vanished record
/// fails the job outright.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upstream source could not be reached or answered with a server
    /// error.
    #[display("upstream unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The request exceeded its time bound.
    #[display("upstream fetch timed out")]
    Timeout,
    /// The upstream is throttling us.
    #[display("upstream throttled the request")]
    Throttled,
    /// The upstream no longer serves this id.
    #[display("upstream has no record for id {_0}")]
    Missing(#[error(not(source))] u64),
    /// The response arrived but cannot be understood.
    #[display("malformed upstream record: {_0}")]
    Malformed(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A malformed source record will not self-correct, and a deleted
        // record does not come back on retry.
        matches!(self, Self::Unavailable(_) | Self::Timeout | Self::Throttled)
    }
}

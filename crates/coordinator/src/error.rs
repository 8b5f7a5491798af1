//! Coordinator Error Types
//!
//! Every failure that reaches the caller has also been reported through the
//! [`Notify`](crate::Notify) seam, except gating failures: those mean the
//! caller asked for something its own view showed as disabled.

use crate::Operation;
use buildcache_model::{CacheKind, Uuid};
use derive_more::{Display, Error};

/// A coordinator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backend rejected or failed the command. Any optimistic change has
    /// been reverted.
    #[display("backend command failed")]
    Backend,
    /// Another mutating command for this pair is still outstanding.
    #[display("{_1} cache of {_0} is busy")]
    Busy(#[error(not(source))] Uuid, #[error(not(source))] CacheKind),
    /// The operation's enablement predicate is false for the current state.
    #[display("{_0} is not available for {_1}")]
    NotAllowed(#[error(not(source))] Operation, #[error(not(source))] Uuid),
    /// The version is not loaded, or was removed.
    #[display("unknown version: {_0}")]
    UnknownVersion(#[error(not(source))] Uuid),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(..) | Self::Backend)
    }
}

//! Backend Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use buildcache_model::{CacheKind, Uuid};
use derive_more::{Display, Error};

/// A backend error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Clone, Debug, Display, Error)]
pub enum ErrorKind {
    /// The backend process could not be reached at all.
    #[display("backend unreachable: {_0}")]
    Unreachable(#[error(not(source))] String),
    /// The backend does not know this version.
    #[display("version not found: {_0}")]
    VersionNotFound(#[error(not(source))] Uuid),
    /// There is no cache of this kind on disk (yet).
    #[display("no {_1} cache for version {_0}")]
    NoCache(#[error(not(source))] Uuid, #[error(not(source))] CacheKind),
    /// Another cache operation is already running for this version and kind.
    #[display("cache operation in progress")]
    Busy,
    /// The command is not supported for this cache kind.
    #[display("unsupported operation: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// The backend refused the command.
    #[display("command rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Busy)
    }
}

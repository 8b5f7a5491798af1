//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backend emitted an event name this engine does not subscribe to.
    #[display("unknown event: {_0}")]
    UnknownEvent(#[error(not(source))] String),
    /// The event name was recognised but its payload did not decode.
    #[display("malformed {_0} payload")]
    MalformedEvent(#[error(not(source))] String),
    /// A cache kind string was neither `game` nor `offline`.
    #[display("invalid cache kind: {_0}")]
    InvalidKind(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

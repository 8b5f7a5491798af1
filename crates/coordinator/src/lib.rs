//! Operation coordinator.
//!
//! Translates user intents (clear, download, repair, delete, remove, add
//! build) into backend commands, applies the matching optimistic change to
//! the [`Store`](buildcache_store::Store) straight away, and undoes it if the
//! backend rejects the request. Backend events are folded in by
//! [`Coordinator::pump`].

mod coordinator;
pub mod error;
mod inflight;
mod pump;
mod seams;
mod settings;
mod view;

pub use crate::coordinator::{BatchOutcome, Coordinator, Outcome};
pub use crate::pump::PumpStats;
pub use crate::seams::{AutoConfirm, Confirm, Level, LogNotifier, Notice, Notify, Prompt};
pub use crate::settings::{Settings, backend_for};
pub use crate::view::{CacheRow, VersionRow};
use derive_more::Display;

/// User-triggered operations, for logging and error reporting.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash)]
pub enum Operation {
    #[display("validate")]
    Validate,
    #[display("size query")]
    RefreshSize,
    #[display("clear")]
    Clear,
    #[display("download")]
    Download,
    #[display("repair")]
    Repair,
    #[display("delete")]
    Delete,
    #[display("remove")]
    Remove,
    #[display("open folder")]
    OpenFolder,
}

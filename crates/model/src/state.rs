use crate::{CacheItem, ItemMap};
use derive_more::Display;

/// Mirror of one `(version, kind)` cache as last reported.
///
/// `done` only says a validation pass has finished since observation began;
/// an empty map with `done = true` means "validated, nothing here".
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VersionCacheState {
    pub items: ItemMap,
    pub done: bool,
}

/// Where a `(version, kind)` pair sits in its validation lifecycle.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Phase {
    /// Nothing received yet.
    #[display("not started")]
    NotStarted,
    /// At least one event received, no terminal event yet.
    #[display("validating")]
    Validating,
    /// Done, and no item is corrupt while present.
    #[display("clean")]
    DoneClean,
    /// Done, and at least one item is corrupt while present.
    #[display("corrupted")]
    DoneCorrupted,
}

impl VersionCacheState {
    pub fn new(items: ItemMap, done: bool) -> Self {
        Self { items, done }
    }

    /// The "cleared" state: validated, and nothing on disk.
    pub fn empty_done() -> Self {
        Self { items: ItemMap::new(), done: true }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_damaged_items(&self) -> bool {
        self.items.values().any(CacheItem::is_damaged)
    }

    pub fn phase(&self) -> Phase {
        match (self.done, self.items.is_empty()) {
            (false, true) => Phase::NotStarted,
            (false, false) => Phase::Validating,
            (true, _) if self.has_damaged_items() => Phase::DoneCorrupted,
            (true, _) => Phase::DoneClean,
        }
    }
}

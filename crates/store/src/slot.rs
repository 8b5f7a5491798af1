use crate::COARSE_ITEM;
use buildcache_model::{CacheItem, CacheKind, ItemMap, Uuid, VersionCacheState};
use derive_more::Display;
use std::sync::Arc;

/// Per-pair re-arm counter. Bumped every time a local operation starts a new
/// pass or resets the pair, never decremented.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Generation(u64);
impl Generation {
    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Lifecycle of the validation pass a slot is currently reflecting.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum PassState {
    /// No pass observed yet.
    #[default]
    Idle,
    /// A pass is running; backend events are applied.
    Open,
    /// The last pass reached its terminal event. A further snapshot starts a
    /// new backend-initiated pass; a byte count is a late arrival from the
    /// finished one.
    Completed,
    /// The pair was reset locally (clear/delete). Events belong to passes
    /// that started before the reset and are discarded until a new pass is
    /// opened locally.
    Sealed,
}

/// Proof of which generation a local operation started. Completions and
/// reverts carrying an outdated ticket are ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ticket {
    pub uuid: Uuid,
    pub kind: CacheKind,
    pub generation: Generation,
}

/// What a slot looked like before an optimistic change, kept so that the
/// change can be undone if the backend rejects the command.
#[derive(Clone, Debug)]
pub struct SlotSnapshot {
    pub(crate) state: Arc<VersionCacheState>,
    pub(crate) pass: PassState,
    pub(crate) running: Option<u64>,
}
impl SlotSnapshot {
    pub fn state(&self) -> &VersionCacheState {
        &self.state
    }

    pub fn pass(&self) -> PassState {
        self.pass
    }
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) state: Arc<VersionCacheState>,
    pub(crate) generation: Generation,
    pub(crate) pass: PassState,
    /// Latest byte count of the coarse protocol within the open pass.
    pub(crate) running: Option<u64>,
}
impl Slot {
    pub(crate) fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            state: Arc::clone(&self.state),
            pass: self.pass,
            running: self.running,
        }
    }

    pub(crate) fn restore(&mut self, prior: SlotSnapshot) {
        self.state = prior.state;
        self.pass = prior.pass;
        self.running = prior.running;
    }

    /// Record a coarse byte count as the single synthetic item. The pass is
    /// still running, so `done` is cleared.
    pub(crate) fn write_counter(&mut self, bytes: u64) {
        self.running = Some(bytes);
        let state = self.state_mut();
        state.items = ItemMap::from([(COARSE_ITEM.to_string(), CacheItem::present(bytes))]);
        state.done = false;
    }

    /// Returns whether `done` was not already set.
    pub(crate) fn mark_done(&mut self) -> bool {
        if self.state.done {
            return false;
        }
        self.state_mut().done = true;
        true
    }

    /// Copy-on-write access: readers holding the previous `Arc` keep their
    /// consistent snapshot.
    pub(crate) fn state_mut(&mut self) -> &mut VersionCacheState {
        Arc::make_mut(&mut self.state)
    }
}

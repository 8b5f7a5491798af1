use crate::slot::Slot;
use crate::{Generation, PassState, SlotSnapshot, StoreUpdate, Subscription, Ticket};
use buildcache_model::{CacheKind, ItemMap, Uuid, VersionCacheState, VersionEntry};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

// Subscribers are UI consumers redrawing rows; a few hundred updates of
// headroom covers a full validation burst across every known version.
const UPDATE_CHANNEL_CAPACITY: usize = 512;

type PairKey = (Uuid, CacheKind);

/// How [`Store::open_pass`] re-arms a pair before the backend reports back.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rearm {
    /// `done = false`, item map untouched (download/repair: progress arrives
    /// through subsequent events).
    KeepItems,
    /// `done = false` and the item map emptied (a fresh validation).
    Reset,
}

/// The authoritative in-memory mirror of cache status for every observed
/// `(version, kind)` pair.
///
/// Cloning a `Store` is cheap and yields a handle to the same data. All reads
/// are synchronous and return an immutable [`Arc`] snapshot; all writes go
/// through one write lock per store and replace a slot's snapshot wholesale,
/// so a half-applied update can never be observed. There is no cross-pair
/// transactionality: the game and offline state of one version are updated
/// independently.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    slots: RwLock<Slots>,
    updates: broadcast::Sender<StoreUpdate>,
}

#[derive(Default)]
struct Slots {
    live: HashMap<PairKey, Slot>,
    /// Versions dropped through [`Store::forget`]. Backend events for them
    /// are refused until they are tracked again.
    forgotten: HashSet<Uuid>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                slots: RwLock::new(Slots::default()),
                updates,
            }),
        }
    }

    // A panic while holding the lock cannot leave a slot half-written (slots
    // are swapped, not edited in place), so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.inner.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.inner.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, uuid: Uuid, kind: CacheKind, slot: &Slot, removed: bool) {
        // No receivers is fine: nobody is looking.
        _ = self.inner.updates.send(StoreUpdate {
            uuid,
            kind,
            generation: slot.generation,
            state: Arc::clone(&slot.state),
            removed,
        });
    }

    /// Run `f` against a slot (created on demand) under the write lock.
    ///
    /// `f` returns whether it changed anything; only changes are broadcast.
    pub(crate) fn update<R>(&self, uuid: Uuid, kind: CacheKind, f: impl FnOnce(&mut Slot) -> (R, bool)) -> R {
        let mut slots = self.write();
        let slot = slots.live.entry((uuid, kind)).or_default();
        let (result, changed) = f(slot);
        if changed {
            self.publish(uuid, kind, slot, false);
        }
        result
    }

    /// Like [`update`](Self::update), but `None` without touching anything
    /// when the version has been forgotten.
    pub(crate) fn update_tracked<R>(
        &self,
        uuid: Uuid,
        kind: CacheKind,
        f: impl FnOnce(&mut Slot) -> (R, bool),
    ) -> Option<R> {
        let mut slots = self.write();
        if slots.forgotten.contains(&uuid) {
            return None;
        }
        let slot = slots.live.entry((uuid, kind)).or_default();
        let (result, changed) = f(slot);
        if changed {
            self.publish(uuid, kind, slot, false);
        }
        Some(result)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current state of a pair, creating an empty not-done slot if absent.
    pub fn get(&self, uuid: Uuid, kind: CacheKind) -> Arc<VersionCacheState> {
        if let Some(slot) = self.read().live.get(&(uuid, kind)) {
            return Arc::clone(&slot.state);
        }
        Arc::clone(&self.write().live.entry((uuid, kind)).or_default().state)
    }

    /// Current state of a pair without creating it.
    pub fn peek(&self, uuid: Uuid, kind: CacheKind) -> Option<Arc<VersionCacheState>> {
        self.read().live.get(&(uuid, kind)).map(|slot| Arc::clone(&slot.state))
    }

    pub fn generation(&self, uuid: Uuid, kind: CacheKind) -> Generation {
        self.read().live.get(&(uuid, kind)).map(|slot| slot.generation).unwrap_or_default()
    }

    pub fn pass(&self, uuid: Uuid, kind: CacheKind) -> PassState {
        self.read().live.get(&(uuid, kind)).map(|slot| slot.pass).unwrap_or_default()
    }

    /// Whether the current generation is still `ticket`'s.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation(ticket.uuid, ticket.kind) == ticket.generation
    }

    /// Number of tracked pairs.
    pub fn len(&self) -> usize {
        self.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().live.is_empty()
    }

    /// Whether `uuid` was dropped through [`forget`](Self::forget) and not
    /// tracked again since.
    pub fn is_forgotten(&self, uuid: Uuid) -> bool {
        self.read().forgotten.contains(&uuid)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.inner.updates.subscribe())
    }

    // =========================================================================
    // Raw mutations
    // =========================================================================

    /// Eagerly create slots for both kinds of every version. A forgotten
    /// version becomes known again.
    pub fn track<'a>(&self, versions: impl IntoIterator<Item = &'a VersionEntry>) {
        let mut slots = self.write();
        for version in versions {
            slots.forgotten.remove(&version.uuid);
            for kind in CacheKind::ALL {
                slots.live.entry((version.uuid, kind)).or_default();
            }
        }
    }

    /// Replace the whole item map and completion flag of a pair at once.
    pub fn replace_items(&self, uuid: Uuid, kind: CacheKind, items: ItemMap, done: bool) {
        self.update(uuid, kind, |slot| {
            slot.state = Arc::new(VersionCacheState::new(items, done));
            slot.running = None;
            ((), true)
        });
    }

    /// Record the coarse protocol's running byte count as the pair's single
    /// synthetic item. The pass is in progress, so `done` is cleared.
    pub fn set_running_size(&self, uuid: Uuid, kind: CacheKind, bytes: u64) {
        self.update(uuid, kind, |slot| {
            slot.write_counter(bytes);
            ((), true)
        });
    }

    pub fn set_done(&self, uuid: Uuid, kind: CacheKind) {
        self.update(uuid, kind, |slot| ((), slot.mark_done()));
    }

    // =========================================================================
    // Generation-tracked mutations
    // =========================================================================

    /// Start a new locally-initiated pass: bump the generation, accept
    /// backend events again and re-arm the state so no stale "done" shows
    /// while the new operation is in flight.
    ///
    /// Returns the ticket for the new pass and what the slot looked like
    /// before, for [`revert`](Self::revert).
    pub fn open_pass(&self, uuid: Uuid, kind: CacheKind, rearm: Rearm) -> (Ticket, SlotSnapshot) {
        self.update(uuid, kind, |slot| {
            let prior = slot.snapshot();
            slot.generation = slot.generation.next();
            slot.pass = PassState::Open;
            slot.running = None;
            match rearm {
                Rearm::KeepItems => slot.state_mut().done = false,
                Rearm::Reset => slot.state = Arc::new(VersionCacheState::default()),
            }
            ((Ticket { uuid, kind, generation: slot.generation }, prior), true)
        })
    }

    /// Optimistically reset a pair to `state` and seal it: any event from a
    /// pass started before this call is stale from now on.
    pub fn seal(&self, uuid: Uuid, kind: CacheKind, state: VersionCacheState) -> (Ticket, SlotSnapshot) {
        self.update(uuid, kind, |slot| {
            let prior = slot.snapshot();
            slot.generation = slot.generation.next();
            slot.pass = PassState::Sealed;
            slot.running = None;
            slot.state = Arc::new(state);
            ((Ticket { uuid, kind, generation: slot.generation }, prior), true)
        })
    }

    /// Undo an optimistic change, unless something newer has re-armed the
    /// pair since. Returns whether the revert happened.
    pub fn revert(&self, ticket: &Ticket, prior: SlotSnapshot) -> bool {
        self.update(ticket.uuid, ticket.kind, |slot| {
            if slot.generation != ticket.generation {
                tracing::debug!(
                    uuid = %ticket.uuid,
                    kind = %ticket.kind,
                    ticket = %ticket.generation,
                    current = %slot.generation,
                    "Skipping revert; pair was re-armed since"
                );
                return (false, false);
            }
            slot.restore(prior);
            (true, true)
        })
    }

    /// Drop both slots of a version that is no longer known to the UI.
    ///
    /// Subscribers receive a `removed` update per dropped slot, and backend
    /// events for the version are refused from now on.
    pub fn forget(&self, uuid: Uuid) {
        let mut slots = self.write();
        slots.forgotten.insert(uuid);
        for kind in CacheKind::ALL {
            if let Some(slot) = slots.live.remove(&(uuid, kind)) {
                let gone = Slot { generation: slot.generation, ..Slot::default() };
                self.publish(uuid, kind, &gone, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COARSE_ITEM;
    use buildcache_model::CacheItem;

    fn uuid() -> Uuid {
        Uuid::new_v4()
    }

    fn items(entries: &[(&str, CacheItem)]) -> ItemMap {
        entries.iter().map(|(n, i)| (n.to_string(), *i)).collect()
    }

    #[test]
    fn test_get_creates_default() {
        let store = Store::new();
        let id = uuid();
        assert!(store.peek(id, CacheKind::Game).is_none());
        let state = store.get(id, CacheKind::Game);
        assert_eq!(*state, VersionCacheState::default());
        assert!(store.peek(id, CacheKind::Game).is_some());
        // The other kind is untouched.
        assert!(store.peek(id, CacheKind::Offline).is_none());
    }

    #[test]
    fn test_track_is_eager() {
        let store = Store::new();
        let versions = [VersionEntry::new(uuid()), VersionEntry::new(uuid())];
        store.track(&versions);
        assert_eq!(store.len(), 4);
        store.track(&versions);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_replace_items_is_wholesale() {
        let store = Store::new();
        let id = uuid();
        store.replace_items(id, CacheKind::Game, items(&[("a", CacheItem::present(1))]), false);
        store.replace_items(id, CacheKind::Game, items(&[("b", CacheItem::present(2))]), true);
        let state = store.get(id, CacheKind::Game);
        assert!(state.done);
        assert_eq!(state.items.len(), 1);
        assert!(state.items.contains_key("b"));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = Store::new();
        let id = uuid();
        store.replace_items(id, CacheKind::Offline, items(&[("a", CacheItem::present(1))]), false);
        let before = store.get(id, CacheKind::Offline);
        store.set_done(id, CacheKind::Offline);
        assert!(!before.done);
        assert!(store.get(id, CacheKind::Offline).done);
    }

    #[test]
    fn test_running_size_is_synthetic_item() {
        let store = Store::new();
        let id = uuid();
        store.set_running_size(id, CacheKind::Game, 10);
        store.set_running_size(id, CacheKind::Game, 20);
        let state = store.get(id, CacheKind::Game);
        assert!(!state.done);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items.get(COARSE_ITEM), Some(&CacheItem::present(20)));
        store.set_done(id, CacheKind::Game);
        assert!(store.get(id, CacheKind::Game).done);
    }

    #[test]
    fn test_open_pass_bumps_generation() {
        let store = Store::new();
        let id = uuid();
        store.replace_items(id, CacheKind::Offline, items(&[("a", CacheItem::present(1))]), true);
        let (first, _) = store.open_pass(id, CacheKind::Offline, Rearm::KeepItems);
        let state = store.get(id, CacheKind::Offline);
        assert!(!state.done);
        assert_eq!(state.items.len(), 1);
        let (second, _) = store.open_pass(id, CacheKind::Offline, Rearm::Reset);
        assert!(second.generation > first.generation);
        assert!(store.get(id, CacheKind::Offline).is_empty());
        assert!(!store.is_current(&first));
        assert!(store.is_current(&second));
        assert_eq!(store.pass(id, CacheKind::Offline), PassState::Open);
    }

    #[test]
    fn test_revert_restores_prior() {
        let store = Store::new();
        let id = uuid();
        store.replace_items(id, CacheKind::Game, items(&[("a", CacheItem::present(1))]), true);
        let (ticket, prior) = store.seal(id, CacheKind::Game, VersionCacheState::empty_done());
        assert!(store.get(id, CacheKind::Game).is_empty());
        assert!(store.revert(&ticket, prior));
        let state = store.get(id, CacheKind::Game);
        assert!(state.done);
        assert_eq!(state.items.len(), 1);
        assert_eq!(store.pass(id, CacheKind::Game), PassState::Idle);
    }

    #[test]
    fn test_revert_skipped_when_superseded() {
        let store = Store::new();
        let id = uuid();
        let (stale, prior) = store.seal(id, CacheKind::Game, VersionCacheState::empty_done());
        let (_current, _) = store.open_pass(id, CacheKind::Game, Rearm::Reset);
        assert!(!store.revert(&stale, prior));
        assert_eq!(store.pass(id, CacheKind::Game), PassState::Open);
    }

    #[tokio::test]
    async fn test_forget() {
        let store = Store::new();
        let version = VersionEntry::new(uuid());
        store.track([&version]);
        let mut subscription = store.subscribe();
        store.forget(version.uuid);
        assert!(store.is_empty());
        assert!(store.is_forgotten(version.uuid));
        for _ in CacheKind::ALL {
            let update = subscription.recv().await.unwrap();
            assert!(update.removed);
            assert_eq!(update.uuid, version.uuid);
            assert!(update.state.is_empty());
        }
        assert!(subscription.try_recv().is_none());

        store.track([&version]);
        assert!(!store.is_forgotten(version.uuid));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_mutation_in_order() {
        let store = Store::new();
        let mut subscription = store.subscribe();
        let id = uuid();
        store.replace_items(id, CacheKind::Game, items(&[("a", CacheItem::present(1))]), false);
        store.set_done(id, CacheKind::Game);
        // No change, no broadcast.
        store.set_done(id, CacheKind::Game);
        let first = subscription.recv().await.unwrap();
        assert!(!first.state.done);
        let second = subscription.recv().await.unwrap();
        assert!(second.state.done);
        assert_eq!(second.uuid, id);
        assert!(subscription.try_recv().is_none());
    }
}

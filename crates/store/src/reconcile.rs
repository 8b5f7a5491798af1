//! Folding backend events into the [`Store`].
//!
//! Both event protocols end up in the same [`VersionCacheState`] shape: an
//! itemized snapshot replaces the item map verbatim, while the coarse byte
//! counter is stored as a single synthetic [`COARSE_ITEM`].
//!
//! Nothing here fails. Input that cannot be applied is reported as
//! [`Reconciled::Ignored`] and logged: stale events at `debug`, protocol
//! violations at `warn`.

use crate::slot::Slot;
use crate::{COARSE_ITEM, Generation, PassState, Store, Ticket};
use buildcache_model::event::{BackendEvent, CacheProgress, ValidatedItem};
use buildcache_model::{CacheItem, CacheKind, ItemMap, Uuid, VersionCacheState};
use derive_more::Display;
use std::sync::Arc;

/// How the command that drove a coarse pass ended.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PassOutcome {
    /// Validation finished and found nothing wrong.
    #[display("verified")]
    Verified,
    /// Validation finished and found the cache damaged.
    #[display("corrupt")]
    Corrupt,
    /// The query failed, which means no cache exists yet.
    #[display("absent")]
    Absent,
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum IgnoreReason {
    /// The pair was reset locally after this event's pass began.
    #[display("pair sealed by a local reset")]
    Sealed,
    /// A newer local operation has re-armed the pair.
    #[display("stale generation {ticket} (current {current})")]
    StaleGeneration { ticket: Generation, current: Generation },
    /// A byte count arrived after its pass had already ended.
    #[display("pass already finished")]
    Finished,
    /// The version was removed from the store.
    #[display("version forgotten")]
    Forgotten,
    /// The running byte count went backwards within one pass.
    #[display("byte counter regressed from {previous} to {reported}")]
    Regressed { previous: u64, reported: u64 },
    /// The event could not be decoded.
    #[display("malformed event: {_0}")]
    Malformed(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reconciled {
    Applied,
    Ignored(IgnoreReason),
}
impl Reconciled {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Applies backend events and command completions to a [`Store`].
#[derive(Clone)]
pub struct Reconciler {
    store: Store,
}
impl Reconciler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Apply one decoded backend event.
    pub fn apply(&self, event: BackendEvent) -> Reconciled {
        match event {
            BackendEvent::Progress(progress) => self.apply_snapshot(progress),
            BackendEvent::Validated { kind, item } => self.apply_counter(kind, item),
        }
    }

    /// Decode and apply an event straight off the bus. Undecodable payloads
    /// are logged and ignored.
    pub fn apply_raw(&self, name: &str, payload: &str) -> Reconciled {
        match BackendEvent::decode(name, payload) {
            Ok(event) => self.apply(event),
            Err(err) => {
                tracing::warn!(event = name, error = %err, "Ignoring undecodable backend event");
                Reconciled::Ignored(IgnoreReason::Malformed(err.to_string()))
            },
        }
    }

    /// Itemized protocol: each snapshot is the full current truth for the
    /// pair and replaces the previous one (last write wins).
    fn apply_snapshot(&self, progress: CacheProgress) -> Reconciled {
        let uuid = progress.uuid;
        let kind = progress.kind();
        let CacheProgress { items, done, .. } = progress;
        self.tracked(uuid, kind, move |slot| {
            if slot.pass == PassState::Sealed {
                tracing::debug!(%uuid, %kind, "Discarding snapshot for sealed pair");
                return (Reconciled::Ignored(IgnoreReason::Sealed), false);
            }
            if slot.pass != PassState::Open {
                tracing::debug!(%uuid, %kind, "Backend started a validation pass");
            }
            slot.state = Arc::new(VersionCacheState::new(items, done));
            slot.running = None;
            slot.pass = if done { PassState::Completed } else { PassState::Open };
            if done {
                tracing::info!(%uuid, %kind, phase = %slot.state.phase(), "Validation pass complete");
            }
            (Reconciled::Applied, true)
        })
    }

    /// Coarse protocol: the running byte total must not decrease within a
    /// pass. The pass only ends through [`complete`](Self::complete).
    fn apply_counter(&self, kind: CacheKind, item: ValidatedItem) -> Reconciled {
        let ValidatedItem { uuid, sz } = item;
        self.tracked(uuid, kind, move |slot| {
            match (slot.pass, slot.running) {
                (PassState::Sealed, _) => {
                    tracing::debug!(%uuid, %kind, bytes = sz, "Discarding byte count for sealed pair");
                    return (Reconciled::Ignored(IgnoreReason::Sealed), false);
                },
                (PassState::Completed, _) => {
                    tracing::debug!(%uuid, %kind, bytes = sz, "Discarding byte count for finished pass");
                    return (Reconciled::Ignored(IgnoreReason::Finished), false);
                },
                (PassState::Open, Some(previous)) if sz < previous => {
                    tracing::warn!(%uuid, %kind, previous, reported = sz, "Ignoring decreasing byte count");
                    return (Reconciled::Ignored(IgnoreReason::Regressed { previous, reported: sz }), false);
                },
                (PassState::Idle, _) => {
                    tracing::debug!(%uuid, %kind, "Backend started a validation pass");
                    slot.pass = PassState::Open;
                },
                (PassState::Open, _) => {},
            }
            slot.write_counter(sz);
            (Reconciled::Applied, true)
        })
    }

    /// Terminal event of a locally-started pass: the command behind `ticket`
    /// resolved. Ignored if the pair has been re-armed since.
    pub fn complete(&self, ticket: &Ticket, outcome: PassOutcome) -> Reconciled {
        let Ticket { uuid, kind, generation } = *ticket;
        self.tracked(uuid, kind, move |slot| {
            if let Err(reason) = check_generation(slot, generation) {
                tracing::debug!(%uuid, %kind, %reason, "Discarding stale completion");
                return (Reconciled::Ignored(reason), false);
            }
            finish(slot, outcome);
            tracing::info!(%uuid, %kind, %outcome, phase = %slot.state.phase(), "Validation pass complete");
            (Reconciled::Applied, true)
        })
    }

    /// Terminal event of a locally-started size query: the backend reported
    /// `bytes` on disk. Recorded as the pass's byte count and completed as
    /// [`PassOutcome::Verified`], unless the pair has been re-armed since.
    pub fn measure(&self, ticket: &Ticket, bytes: u64) -> Reconciled {
        let Ticket { uuid, kind, generation } = *ticket;
        self.tracked(uuid, kind, move |slot| {
            if let Err(reason) = check_generation(slot, generation) {
                tracing::debug!(%uuid, %kind, %reason, "Discarding stale size report");
                return (Reconciled::Ignored(reason), false);
            }
            slot.write_counter(bytes);
            finish(slot, PassOutcome::Verified);
            tracing::info!(%uuid, %kind, bytes, "Cache size measured");
            (Reconciled::Applied, true)
        })
    }

    fn tracked(&self, uuid: Uuid, kind: CacheKind, f: impl FnOnce(&mut Slot) -> (Reconciled, bool)) -> Reconciled {
        self.store.update_tracked(uuid, kind, f).unwrap_or_else(|| {
            tracing::debug!(%uuid, %kind, "Discarding event for forgotten version");
            Reconciled::Ignored(IgnoreReason::Forgotten)
        })
    }
}

fn check_generation(slot: &Slot, generation: Generation) -> Result<(), IgnoreReason> {
    match slot.generation == generation {
        true => Ok(()),
        false => Err(IgnoreReason::StaleGeneration { ticket: generation, current: slot.generation }),
    }
}

fn finish(slot: &mut Slot, outcome: PassOutcome) {
    let running = slot.running.take();
    let state = slot.state_mut();
    match outcome {
        PassOutcome::Verified => {
            if let Some(item) = state.items.get_mut(COARSE_ITEM) {
                item.corrupt = false;
                item.missing = false;
            }
        },
        PassOutcome::Corrupt => {
            let size = running.unwrap_or(0);
            let item = state.items.entry(COARSE_ITEM.to_string()).or_insert(CacheItem::present(size));
            item.corrupt = true;
            item.missing = false;
        },
        PassOutcome::Absent => state.items = ItemMap::new(),
    }
    slot.mark_done();
    slot.pass = PassState::Completed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rearm;
    use buildcache_model::event::{CACHE_PROGRESS, VALIDATED_ITEM_GAME};
    use buildcache_model::{Phase, Uuid, facts};
    use rstest::rstest;

    fn items(entries: &[(&str, CacheItem)]) -> ItemMap {
        entries.iter().map(|(n, i)| (n.to_string(), *i)).collect()
    }

    fn snapshot(uuid: Uuid, kind: CacheKind, entries: &[(&str, CacheItem)], done: bool) -> BackendEvent {
        BackendEvent::Progress(CacheProgress { uuid, offline: kind.is_offline(), items: items(entries), done })
    }

    fn counter(uuid: Uuid, kind: CacheKind, sz: u64) -> BackendEvent {
        BackendEvent::Validated { kind, item: ValidatedItem { uuid, sz } }
    }

    fn setup() -> (Reconciler, Uuid) {
        (Reconciler::new(Store::new()), Uuid::new_v4())
    }

    #[test]
    fn test_last_snapshot_wins() {
        let (reconciler, id) = setup();
        let other = Uuid::new_v4();
        let sequence = [
            snapshot(id, CacheKind::Game, &[("a", CacheItem::present(1))], false),
            snapshot(other, CacheKind::Game, &[("x", CacheItem::corrupt(9))], false),
            snapshot(id, CacheKind::Game, &[("a", CacheItem::present(1)), ("b", CacheItem::missing(5))], false),
            snapshot(other, CacheKind::Game, &[("x", CacheItem::present(9))], true),
            snapshot(id, CacheKind::Game, &[("a", CacheItem::present(1))], false),
        ];
        for event in sequence {
            assert!(reconciler.apply(event).is_applied());
        }
        let state = reconciler.store().get(id, CacheKind::Game);
        assert_eq!(*state, VersionCacheState::new(items(&[("a", CacheItem::present(1))]), false));
        assert_eq!(reconciler.store().get(other, CacheKind::Game).phase(), Phase::DoneClean);
    }

    #[test]
    fn test_duplicate_snapshot_is_idempotent() {
        let (reconciler, id) = setup();
        let event = snapshot(id, CacheKind::Offline, &[("a", CacheItem::corrupt(1000))], true);
        reconciler.apply(event.clone());
        let first = reconciler.store().get(id, CacheKind::Offline);
        reconciler.apply(event);
        assert_eq!(*first, *reconciler.store().get(id, CacheKind::Offline));
    }

    #[test]
    fn test_kinds_are_independent() {
        let (reconciler, id) = setup();
        reconciler.apply(snapshot(id, CacheKind::Game, &[("a", CacheItem::present(1))], true));
        let offline = reconciler.store().get(id, CacheKind::Offline);
        assert_eq!(offline.phase(), Phase::NotStarted);
    }

    #[rstest]
    #[case(CacheItem::present(1000), Phase::DoneClean)]
    #[case(CacheItem::corrupt(1000), Phase::DoneCorrupted)]
    fn test_terminal_snapshot_phase(#[case] item: CacheItem, #[case] expected: Phase) {
        let (reconciler, id) = setup();
        reconciler.apply(snapshot(id, CacheKind::Game, &[("a", item)], true));
        let state = reconciler.store().get(id, CacheKind::Game);
        assert_eq!(state.phase(), expected);
        assert_eq!(facts::validated_size(&state), Some(1000));
        assert_eq!(reconciler.store().pass(id, CacheKind::Game), PassState::Completed);
    }

    #[test]
    fn test_sealed_pair_discards_events() {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        reconciler.apply(snapshot(id, CacheKind::Offline, &[("a", CacheItem::present(1))], false));
        store.seal(id, CacheKind::Offline, VersionCacheState::empty_done());
        let late = snapshot(id, CacheKind::Offline, &[("a", CacheItem::present(1))], true);
        assert_eq!(reconciler.apply(late), Reconciled::Ignored(IgnoreReason::Sealed));
        assert_eq!(reconciler.apply(counter(id, CacheKind::Offline, 5)), Reconciled::Ignored(IgnoreReason::Sealed));
        assert_eq!(*store.get(id, CacheKind::Offline), VersionCacheState::empty_done());
        // A new local pass accepts events again.
        store.open_pass(id, CacheKind::Offline, Rearm::KeepItems);
        let fresh = snapshot(id, CacheKind::Offline, &[("b", CacheItem::present(2))], false);
        assert!(reconciler.apply(fresh).is_applied());
    }

    #[test]
    fn test_counter_rejects_regression() {
        let (reconciler, id) = setup();
        assert!(reconciler.apply(counter(id, CacheKind::Game, 100)).is_applied());
        assert!(reconciler.apply(counter(id, CacheKind::Game, 100)).is_applied());
        assert_eq!(
            reconciler.apply(counter(id, CacheKind::Game, 50)),
            Reconciled::Ignored(IgnoreReason::Regressed { previous: 100, reported: 50 })
        );
        let state = reconciler.store().get(id, CacheKind::Game);
        assert_eq!(facts::validated_size(&state), Some(100));
        assert_eq!(state.phase(), Phase::Validating);
    }

    #[test]
    fn test_new_pass_resets_counter_baseline() {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        reconciler.apply(counter(id, CacheKind::Game, 100));
        let (ticket, _) = store.open_pass(id, CacheKind::Game, Rearm::Reset);
        assert!(reconciler.apply(counter(id, CacheKind::Game, 10)).is_applied());
        reconciler.complete(&ticket, PassOutcome::Verified);
        assert_eq!(reconciler.store().get(id, CacheKind::Game).items.get(COARSE_ITEM), Some(&CacheItem::present(10)));
    }

    #[rstest]
    #[case::repeat(300)]
    #[case::later(400)]
    fn test_counter_after_completion_is_discarded(#[case] late: u64) {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        let (ticket, _) = store.open_pass(id, CacheKind::Game, Rearm::Reset);
        reconciler.apply(counter(id, CacheKind::Game, 300));
        reconciler.complete(&ticket, PassOutcome::Verified);
        assert_eq!(reconciler.apply(counter(id, CacheKind::Game, late)), Reconciled::Ignored(IgnoreReason::Finished));
        let state = store.get(id, CacheKind::Game);
        assert!(state.done);
        assert_eq!(state.phase(), Phase::DoneClean);
        assert_eq!(facts::validated_size(&state), Some(300));
        assert!(facts::can_clear(&state));
    }

    #[test]
    fn test_forgotten_version_ignores_events() {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        let (ticket, _) = store.open_pass(id, CacheKind::Offline, Rearm::Reset);
        store.forget(id);
        let late = snapshot(id, CacheKind::Offline, &[("a", CacheItem::present(1))], true);
        assert_eq!(reconciler.apply(late), Reconciled::Ignored(IgnoreReason::Forgotten));
        assert_eq!(reconciler.apply(counter(id, CacheKind::Game, 1)), Reconciled::Ignored(IgnoreReason::Forgotten));
        assert_eq!(reconciler.complete(&ticket, PassOutcome::Verified), Reconciled::Ignored(IgnoreReason::Forgotten));
        assert!(store.is_empty());
    }

    #[rstest]
    #[case(PassOutcome::Verified, Phase::DoneClean, Some(300))]
    #[case(PassOutcome::Corrupt, Phase::DoneCorrupted, Some(300))]
    #[case(PassOutcome::Absent, Phase::DoneClean, None)]
    fn test_complete_outcomes(#[case] outcome: PassOutcome, #[case] phase: Phase, #[case] size: Option<u64>) {
        let (reconciler, id) = setup();
        let (ticket, _) = reconciler.store().open_pass(id, CacheKind::Game, Rearm::Reset);
        reconciler.apply(counter(id, CacheKind::Game, 300));
        assert!(reconciler.complete(&ticket, outcome).is_applied());
        let state = reconciler.store().get(id, CacheKind::Game);
        assert!(state.done);
        assert_eq!(state.phase(), phase);
        assert_eq!(facts::validated_size(&state), size);
    }

    #[test]
    fn test_corrupt_without_counter_still_marks_pair() {
        let (reconciler, id) = setup();
        let (ticket, _) = reconciler.store().open_pass(id, CacheKind::Offline, Rearm::Reset);
        reconciler.complete(&ticket, PassOutcome::Corrupt);
        let state = reconciler.store().get(id, CacheKind::Offline);
        assert_eq!(state.phase(), Phase::DoneCorrupted);
        assert!(facts::can_repair(&state));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        let (old, _) = store.open_pass(id, CacheKind::Game, Rearm::Reset);
        let (_new, _) = store.open_pass(id, CacheKind::Game, Rearm::Reset);
        let result = reconciler.complete(&old, PassOutcome::Verified);
        assert!(matches!(result, Reconciled::Ignored(IgnoreReason::StaleGeneration { .. })));
        assert!(!store.get(id, CacheKind::Game).done);
    }

    #[test]
    fn test_measure() {
        let (reconciler, id) = setup();
        let store = reconciler.store();
        let (old, _) = store.open_pass(id, CacheKind::Offline, Rearm::Reset);
        let (current, _) = store.open_pass(id, CacheKind::Offline, Rearm::Reset);
        assert!(!reconciler.measure(&old, 10).is_applied());
        assert!(reconciler.measure(&current, 2048).is_applied());
        let state = store.get(id, CacheKind::Offline);
        assert_eq!(state.phase(), Phase::DoneClean);
        assert_eq!(facts::validated_size(&state), Some(2048));
    }

    #[test]
    fn test_apply_raw() {
        let (reconciler, id) = setup();
        let payload = format!(r#"{{"uuid":"{id}","sz":64}}"#);
        assert!(reconciler.apply_raw(VALIDATED_ITEM_GAME, &payload).is_applied());
        let result = reconciler.apply_raw(CACHE_PROGRESS, "{not json");
        assert!(matches!(result, Reconciled::Ignored(IgnoreReason::Malformed(_))));
    }
}

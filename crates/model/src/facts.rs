//! Derived facts.
//!
//! Pure functions over a [`VersionCacheState`] (and where needed, its
//! [`VersionEntry`]). The enablement predicates here are the single source of
//! truth for which operations the coordinator will accept and which buttons
//! the UI shows as active.

use crate::{CacheKind, ItemStatus, ProtectedVersions, VersionCacheState, VersionEntry};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sum of `item_size` over every item that is not missing, corrupt or not.
///
/// Returns `None` when nothing has been reported at all, so that "zero bytes
/// validated" and "nothing validated yet" stay distinguishable.
pub fn validated_size(state: &VersionCacheState) -> Option<u64> {
    if state.items.is_empty() {
        return None;
    }
    Some(
        state
            .items
            .values()
            .filter(|item| item.counts_toward_size())
            .fold(0u64, |acc, item| acc.saturating_add(item.item_size)),
    )
}

/// Whether any item is corrupt.
///
/// Corrupt items that are also missing only count when `count_missing` is
/// set: repair eligibility wants them, the clean/corrupted phase does not.
pub fn is_corrupt(state: &VersionCacheState, count_missing: bool) -> bool {
    state.items.values().any(|item| item.corrupt && (!item.missing || count_missing))
}

/// The byte total a complete cache of this kind should reach, if known.
pub fn expected_total(version: &VersionEntry, kind: CacheKind) -> Option<u64> {
    match kind {
        CacheKind::Game => version.total_uncompressed_size,
        CacheKind::Offline => match (version.total_compressed_size, &version.main_file_info) {
            (Some(compressed), Some(main)) => Some(compressed.saturating_add(main.size)),
            _ => None,
        },
    }
}

pub fn is_removable(version: &VersionEntry, protected: &ProtectedVersions) -> bool {
    !protected.contains(&version.uuid)
}

fn has_content(state: &VersionCacheState) -> bool {
    validated_size(state).is_some_and(|size| size > 0)
}

/// Clear (game cache): a finished pass found something on disk.
pub fn can_clear(state: &VersionCacheState) -> bool {
    state.done && has_content(state)
}

/// Download (offline cache): nothing is present yet, and there is a known
/// target to fetch.
pub fn can_download(state: &VersionCacheState, version: &VersionEntry) -> bool {
    !has_content(state) && expected_total(version, CacheKind::Offline).is_some()
}

/// Repair (offline cache): the finished pass found corruption.
pub fn can_repair(state: &VersionCacheState) -> bool {
    is_corrupt(state, true) && state.done
}

/// Delete (either kind): something is on disk.
pub fn can_delete(state: &VersionCacheState) -> bool {
    has_content(state)
}

/// Remove version: not protected, and neither cache has work in flight.
pub fn can_remove(
    version: &VersionEntry,
    protected: &ProtectedVersions,
    game: &VersionCacheState,
    offline: &VersionCacheState,
) -> bool {
    is_removable(version, protected) && game.done && offline.done
}

/// Names of all missing items, sorted for stable display.
pub fn missing_items(state: &VersionCacheState) -> Vec<&str> {
    let mut names: Vec<&str> =
        state.items.iter().filter(|(_, item)| item.missing).map(|(name, _)| name.as_str()).collect();
    names.sort_unstable();
    names
}

/// Display status of every item, sorted by name.
pub fn item_statuses(state: &VersionCacheState) -> Vec<(&str, ItemStatus)> {
    let damaged = state.has_damaged_items();
    let mut statuses: Vec<(&str, ItemStatus)> =
        state.items.iter().map(|(name, item)| (name.as_str(), item.status(state.done, damaged))).collect();
    statuses.sort_unstable_by_key(|(name, _)| *name);
    statuses
}

/// Render a byte count as gigabytes with two decimals (`None` stays `None`).
pub fn format_gigabytes(bytes: Option<u64>) -> Option<String> {
    bytes.map(|b| format!("{:.2}", b as f64 / BYTES_PER_GB))
}

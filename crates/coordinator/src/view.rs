//! Row view model for the build list.

use buildcache_model::{CacheKind, ItemStatus, Phase, ProtectedVersions, Uuid, VersionCacheState, VersionEntry, facts};

/// One cache of one build, as the list shows it.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRow {
    pub kind: CacheKind,
    pub phase: Phase,
    pub validated_size: Option<u64>,
    pub expected_size: Option<u64>,
    /// Gigabytes, two decimals.
    pub display_size: Option<String>,
    pub display_expected: Option<String>,
    pub corrupt: bool,
    pub missing: Vec<String>,
    /// Every item with its display status, sorted by name.
    pub items: Vec<(String, ItemStatus)>,
    /// A mutating command for this cache is awaiting the backend.
    pub busy: bool,
    pub can_clear: bool,
    pub can_download: bool,
    pub can_repair: bool,
    pub can_delete: bool,
}

impl CacheRow {
    pub(crate) fn new(version: &VersionEntry, kind: CacheKind, state: &VersionCacheState, busy: bool) -> Self {
        let validated_size = facts::validated_size(state);
        let expected_size = facts::expected_total(version, kind);
        let offline = kind.is_offline();
        Self {
            kind,
            phase: state.phase(),
            validated_size,
            expected_size,
            display_size: facts::format_gigabytes(validated_size),
            display_expected: facts::format_gigabytes(expected_size),
            corrupt: facts::is_corrupt(state, false),
            missing: facts::missing_items(state).into_iter().map(str::to_string).collect(),
            items: facts::item_statuses(state).into_iter().map(|(name, status)| (name.to_string(), status)).collect(),
            busy,
            can_clear: !busy && !offline && facts::can_clear(state),
            can_download: !busy && offline && facts::can_download(state, version),
            can_repair: !busy && offline && facts::can_repair(state),
            can_delete: !busy && facts::can_delete(state),
        }
    }
}

/// One visible build.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionRow {
    pub uuid: Uuid,
    pub label: String,
    pub description: Option<String>,
    pub removable: bool,
    pub can_remove: bool,
    pub game: CacheRow,
    pub offline: CacheRow,
}

impl VersionRow {
    pub(crate) fn new(
        version: &VersionEntry,
        protected: &ProtectedVersions,
        (game, game_busy): (&VersionCacheState, bool),
        (offline, offline_busy): (&VersionCacheState, bool),
    ) -> Self {
        Self {
            uuid: version.uuid,
            label: version.label(),
            description: version.description.clone(),
            removable: facts::is_removable(version, protected),
            can_remove: !game_busy && !offline_busy && facts::can_remove(version, protected, game, offline),
            game: CacheRow::new(version, CacheKind::Game, game, game_busy),
            offline: CacheRow::new(version, CacheKind::Offline, offline, offline_busy),
        }
    }

    pub fn cache(&self, kind: CacheKind) -> &CacheRow {
        match kind {
            CacheKind::Game => &self.game,
            CacheKind::Offline => &self.offline,
        }
    }
}

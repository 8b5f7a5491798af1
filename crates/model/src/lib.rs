//! Data model for game build caches.
//!
//! Every known game build ("version") has two independent content caches: the
//! **game** cache (raw playable assets) and the **offline** cache (the
//! compressed distributable package). A backend worker validates, downloads
//! and deletes those caches; this crate describes what it reports back.
//!
//! # Contents
//! - [`CacheItem`] / [`VersionCacheState`]: the per-`(version, kind)` mirror of
//!   what is on disk.
//! - [`VersionEntry`]: immutable build metadata supplied by the backend.
//! - [`event`]: the two wire protocols (itemized snapshots and the legacy
//!   running byte counter).
//! - [`facts`]: pure functions deriving sizes, corruption and button
//!   enablement from the above.

pub mod error;
pub mod event;
pub mod facts;
mod item;
mod kind;
mod protected;
mod state;
mod version;

pub use crate::item::{CacheItem, ItemStatus};
pub use crate::kind::CacheKind;
pub use crate::protected::ProtectedVersions;
pub use crate::state::{Phase, VersionCacheState};
pub use crate::version::{MainFileInfo, VersionEntry, Versions};
pub use uuid::Uuid;

/// Item map keyed by the item's relative name. Unique within a version and kind.
pub type ItemMap = std::collections::HashMap<String, CacheItem>;

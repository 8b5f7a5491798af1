use serde::{Deserialize, Serialize};

/// A single unit of cache content as last reported by the backend.
///
/// `missing` and `corrupt` are independent flags. A missing item is never
/// treated as corrupt for size or repair purposes, but callers auditing the
/// cache may still want to see both.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    /// Size in bytes. Authoritative once reported.
    pub item_size: u64,
    /// The backend could not find this item on disk.
    #[serde(default)]
    pub missing: bool,
    /// The item exists but failed its integrity check.
    #[serde(default)]
    pub corrupt: bool,
}

/// Display status of one item within a validation pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ItemStatus {
    /// Not on disk; needs a download.
    Missing,
    /// On disk but damaged; needs a repair.
    Corrupt,
    /// The pass is done and nothing in the pair is damaged.
    Verified,
    /// Seen, but the pass is still running (or a sibling item is damaged).
    Pending,
}

impl CacheItem {
    pub fn present(item_size: u64) -> Self {
        Self { item_size, missing: false, corrupt: false }
    }

    pub fn missing(item_size: u64) -> Self {
        Self { item_size, missing: true, corrupt: false }
    }

    pub fn corrupt(item_size: u64) -> Self {
        Self { item_size, missing: false, corrupt: true }
    }

    /// Corrupt *and* present on disk, i.e. something a repair can fix.
    pub fn is_damaged(&self) -> bool {
        self.corrupt && !self.missing
    }

    /// Missing items contribute nothing to the validated size.
    pub fn counts_toward_size(&self) -> bool {
        !self.missing
    }

    /// Missing wins over corrupt; otherwise the item is only "verified" once
    /// the whole pair has settled clean.
    pub fn status(&self, pair_done: bool, pair_damaged: bool) -> ItemStatus {
        if self.missing {
            ItemStatus::Missing
        } else if self.corrupt {
            ItemStatus::Corrupt
        } else if pair_done && !pair_damaged {
            ItemStatus::Verified
        } else {
            ItemStatus::Pending
        }
    }
}

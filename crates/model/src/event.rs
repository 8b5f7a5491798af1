//! Backend event payloads.
//!
//! The backend pushes two kinds of progress report, both scoped by
//! `(uuid, kind)`:
//!
//! - **Itemized** (`cache_progress`): a complete per-item map for the current
//!   validation pass. Each snapshot replaces the previous one wholesale.
//! - **Coarse** (`validated_item_game` / `validated_item_offline`): the legacy
//!   running byte total, with no per-item detail. The pass ends when the
//!   command that started it resolves.

use crate::error::{ErrorKind, Result};
use crate::{CacheKind, ItemMap};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CACHE_PROGRESS: &str = "cache_progress";
pub const VALIDATED_ITEM_GAME: &str = "validated_item_game";
pub const VALIDATED_ITEM_OFFLINE: &str = "validated_item_offline";

/// Itemized snapshot event.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheProgress {
    pub uuid: Uuid,
    pub offline: bool,
    #[serde(default)]
    pub items: ItemMap,
    pub done: bool,
}
impl CacheProgress {
    pub fn kind(&self) -> CacheKind {
        CacheKind::from_offline(self.offline)
    }
}

/// Coarse byte-counter event. The kind is carried by the event name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidatedItem {
    pub uuid: Uuid,
    /// Bytes validated so far in the current pass.
    pub sz: u64,
}

/// A decoded backend event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendEvent {
    Progress(CacheProgress),
    Validated { kind: CacheKind, item: ValidatedItem },
}
impl BackendEvent {
    /// Decode an event from its bus name and JSON payload.
    pub fn decode(name: &str, payload: &str) -> Result<Self> {
        match name {
            CACHE_PROGRESS => serde_json::from_str::<CacheProgress>(payload)
                .map(Self::Progress)
                .or_raise(|| ErrorKind::MalformedEvent(name.to_string())),
            VALIDATED_ITEM_GAME | VALIDATED_ITEM_OFFLINE => {
                let item = serde_json::from_str::<ValidatedItem>(payload)
                    .or_raise(|| ErrorKind::MalformedEvent(name.to_string()))?;
                let kind = CacheKind::from_offline(name == VALIDATED_ITEM_OFFLINE);
                Ok(Self::Validated { kind, item })
            },
            _ => exn::bail!(ErrorKind::UnknownEvent(name.to_string())),
        }
    }

    /// Like [`decode`](Self::decode), for payloads that were already parsed
    /// into a JSON value (e.g. one field of a larger log record).
    pub fn decode_value(name: &str, payload: serde_json::Value) -> Result<Self> {
        match name {
            CACHE_PROGRESS => serde_json::from_value::<CacheProgress>(payload)
                .map(Self::Progress)
                .or_raise(|| ErrorKind::MalformedEvent(name.to_string())),
            VALIDATED_ITEM_GAME | VALIDATED_ITEM_OFFLINE => {
                let item = serde_json::from_value::<ValidatedItem>(payload)
                    .or_raise(|| ErrorKind::MalformedEvent(name.to_string()))?;
                let kind = CacheKind::from_offline(name == VALIDATED_ITEM_OFFLINE);
                Ok(Self::Validated { kind, item })
            },
            _ => exn::bail!(ErrorKind::UnknownEvent(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => CACHE_PROGRESS,
            Self::Validated { kind: CacheKind::Game, .. } => VALIDATED_ITEM_GAME,
            Self::Validated { kind: CacheKind::Offline, .. } => VALIDATED_ITEM_OFFLINE,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Progress(p) => p.uuid,
            Self::Validated { item, .. } => item.uuid,
        }
    }

    pub fn kind(&self) -> CacheKind {
        match self {
            Self::Progress(p) => p.kind(),
            Self::Validated { kind, .. } => *kind,
        }
    }
}

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which of a version's two content caches a piece of state belongs to.
///
/// The two kinds never share items or flags. On the wire the backend encodes
/// the kind as a boolean `offline` flag, see [`from_offline`](Self::from_offline).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Raw, playable game assets.
    #[display("game")]
    Game,
    /// Compressed distributable package.
    #[display("offline")]
    Offline,
}
impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::Game, CacheKind::Offline];

    pub fn from_offline(offline: bool) -> Self {
        match offline {
            true => Self::Offline,
            false => Self::Game,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}
impl FromStr for CacheKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "game" => Ok(Self::Game),
            "offline" => Ok(Self::Offline),
            _ => exn::bail!(ErrorKind::InvalidKind(s.to_string())),
        }
    }
}

use crate::Generation;
use buildcache_model::{CacheKind, Uuid, VersionCacheState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// A single applied mutation, as seen by subscribers.
#[derive(Clone, Debug)]
pub struct StoreUpdate {
    pub uuid: Uuid,
    pub kind: CacheKind,
    pub generation: Generation,
    pub state: Arc<VersionCacheState>,
    /// The pair's version was forgotten; `state` is empty and no further
    /// updates follow unless the version is tracked again.
    pub removed: bool,
}

/// Receiving end of the store's update broadcast.
///
/// A subscriber that falls behind skips the updates it missed. Every update
/// carries the full state of its pair, so the next one received is still a
/// consistent picture.
pub struct Subscription {
    receiver: broadcast::Receiver<StoreUpdate>,
}
impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<StoreUpdate>) -> Self {
        Self { receiver }
    }

    /// Wait for the next update. Returns `None` once the store is dropped.
    pub async fn recv(&mut self) -> Option<StoreUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Store subscriber lagged; skipping to latest updates");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StoreUpdate> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => return Some(update),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Store subscriber lagged; skipping to latest updates");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

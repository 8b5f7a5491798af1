use crate::Coordinator;
use buildcache_model::event::BackendEvent;
use buildcache_store::Reconciled;
use futures::{Stream, StreamExt};

/// How many events a [`Coordinator::pump`] run applied and ignored.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PumpStats {
    pub applied: u64,
    pub ignored: u64,
}

impl PumpStats {
    pub fn total(&self) -> u64 {
        self.applied + self.ignored
    }
}

impl Coordinator {
    /// Feed `events` into the store until the stream ends.
    pub async fn pump(&self, events: impl Stream<Item = BackendEvent>) -> PumpStats {
        let mut stats = PumpStats::default();
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            match self.reconciler.apply(event) {
                Reconciled::Applied => stats.applied += 1,
                Reconciled::Ignored(reason) => {
                    tracing::trace!(%reason, "Backend event ignored");
                    stats.ignored += 1;
                },
            }
        }
        tracing::debug!(applied = stats.applied, ignored = stats.ignored, "Backend event stream ended");
        stats
    }

    /// [`pump`](Self::pump) the backend's own event stream.
    pub async fn listen(&self) -> PumpStats {
        self.pump(self.backend.events()).await
    }
}

use crate::Operation;
use buildcache_model::{CacheKind, Uuid};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type PairKey = (Uuid, CacheKind);

/// Mutating command requests currently awaiting the backend's response.
#[derive(Clone, Default)]
pub(crate) struct InFlight(Arc<Mutex<HashMap<PairKey, Operation>>>);

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<PairKey, Operation>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a pair for `operation`. `None` if something else holds it.
    pub(crate) fn acquire(&self, uuid: Uuid, kind: CacheKind, operation: Operation) -> Option<InFlightGuard> {
        let mut running = self.lock();
        if let Some(current) = running.get(&(uuid, kind)) {
            tracing::debug!(%uuid, %kind, %current, requested = %operation, "Pair already has a command in flight");
            return None;
        }
        running.insert((uuid, kind), operation);
        Some(InFlightGuard { owner: self.clone(), key: (uuid, kind) })
    }

    pub(crate) fn running(&self, uuid: Uuid, kind: CacheKind) -> Option<Operation> {
        self.lock().get(&(uuid, kind)).copied()
    }
}

/// Releases its pair when dropped.
pub(crate) struct InFlightGuard {
    owner: InFlight,
    key: PairKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}

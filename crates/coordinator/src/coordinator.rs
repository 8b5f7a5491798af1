use crate::error::{ErrorKind, Result};
use crate::inflight::{InFlight, InFlightGuard};
use crate::seams::{Confirm, Notice, Notify, Prompt};
use crate::view::VersionRow;
use crate::{Operation, Settings};
use buildcache_backend::error::{Error as BackendError, ErrorKind as BackendErrorKind};
use buildcache_backend::{BackendHandle, ValidationAck};
use buildcache_model::{CacheKind, Uuid, VersionCacheState, VersionEntry, facts};
use buildcache_store::{PassOutcome, Rearm, Reconciler, Store, Ticket};
use exn::ResultExt;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

/// Result of a single operation that did not fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The command was accepted by the backend.
    Sent,
    /// The user said no. Nothing was changed.
    Declined,
}

/// Result of a "for all versions" operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchOutcome {
    Declined,
    /// Eligible caches whose command was accepted, and those that failed
    /// (each failure has already been reported as a notice).
    Done { sent: usize, failed: usize },
}

/// Turns user intents into backend commands plus optimistic store updates.
///
/// At most one mutating command request (clear, delete, download, repair,
/// remove) is outstanding per `(version, kind)` pair; a second one fails with
/// [`ErrorKind::Busy`]. Validation is not a mutating command: it may run at
/// any time, and any later command re-arms the pair so that the validation's
/// terminal event is discarded as stale.
pub struct Coordinator {
    pub(crate) backend: BackendHandle,
    pub(crate) reconciler: Reconciler,
    settings: Settings,
    confirm: Arc<dyn Confirm>,
    notify: Arc<dyn Notify>,
    versions: RwLock<Vec<VersionEntry>>,
    removed: RwLock<HashSet<Uuid>>,
    in_flight: InFlight,
}

/// Failures that say "there is nothing on disk" rather than "could not ask".
fn means_absent(err: &BackendError) -> bool {
    matches!(&**err, BackendErrorKind::NoCache(..) | BackendErrorKind::VersionNotFound(_))
}

fn title(kind: CacheKind) -> &'static str {
    match kind {
        CacheKind::Game => "Game",
        CacheKind::Offline => "Offline",
    }
}

impl Coordinator {
    pub fn new(
        backend: BackendHandle,
        store: Store,
        settings: Settings,
        confirm: Arc<dyn Confirm>,
        notify: Arc<dyn Notify>,
    ) -> Self {
        Self {
            backend,
            reconciler: Reconciler::new(store),
            settings,
            confirm,
            notify,
            versions: RwLock::new(Vec::new()),
            removed: RwLock::new(HashSet::new()),
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &Store {
        self.reconciler.store()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn versions(&self) -> RwLockReadGuard<'_, Vec<VersionEntry>> {
        self.versions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn removed(&self) -> RwLockReadGuard<'_, HashSet<Uuid>> {
        self.removed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn removed_mut(&self) -> RwLockWriteGuard<'_, HashSet<Uuid>> {
        self.removed.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn version(&self, uuid: Uuid) -> Result<VersionEntry> {
        if self.removed().contains(&uuid) {
            exn::bail!(ErrorKind::UnknownVersion(uuid));
        }
        match self.versions().iter().find(|v| v.uuid == uuid) {
            Some(version) => Ok(version.clone()),
            None => exn::bail!(ErrorKind::UnknownVersion(uuid)),
        }
    }

    /// Loaded versions that have not been removed, hidden ones included.
    pub fn known_versions(&self) -> Vec<VersionEntry> {
        let removed = self.removed();
        self.versions().iter().filter(|v| !removed.contains(&v.uuid)).cloned().collect()
    }

    /// Loaded versions that are neither hidden nor removed.
    pub fn visible_versions(&self) -> Vec<VersionEntry> {
        self.known_versions().into_iter().filter(|v| !v.hidden).collect()
    }

    /// The mutating command currently awaiting the backend for a pair.
    pub fn running(&self, uuid: Uuid, kind: CacheKind) -> Option<Operation> {
        self.in_flight.running(uuid, kind)
    }

    /// View model for every visible version.
    pub fn rows(&self) -> Vec<VersionRow> {
        let store = self.store();
        self.visible_versions()
            .iter()
            .map(|version| {
                let game = store.get(version.uuid, CacheKind::Game);
                let offline = store.get(version.uuid, CacheKind::Offline);
                VersionRow::new(
                    version,
                    &self.settings.protected,
                    (&game, self.running(version.uuid, CacheKind::Game).is_some()),
                    (&offline, self.running(version.uuid, CacheKind::Offline).is_some()),
                )
            })
            .collect()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch the version list and start tracking the versions it adds.
    /// Returns those new versions; on the first call, that is all of them.
    async fn refresh_versions(&self) -> Result<Vec<VersionEntry>> {
        let versions = match self.backend.get_versions().await {
            Ok(versions) => versions,
            Err(err) => {
                self.notify.notify(Notice::error(format!("Failed to load builds: {err}")));
                return Err(err).or_raise(|| ErrorKind::Backend);
            },
        };
        let added: Vec<VersionEntry> = {
            let removed = self.removed();
            let known = self.versions();
            versions
                .iter()
                .filter(|v| !removed.contains(&v.uuid) && !known.iter().any(|k| k.uuid == v.uuid))
                .cloned()
                .collect()
        };
        self.store().track(&added);
        tracing::info!(count = versions.len(), added = added.len(), backend = self.backend.name(), "Loaded build list");
        *self.versions.write().unwrap_or_else(PoisonError::into_inner) = versions;
        Ok(added)
    }

    async fn validate_all(&self, versions: &[VersionEntry]) {
        for version in versions {
            for kind in CacheKind::ALL {
                self.validate(version.uuid, kind).await;
            }
        }
    }

    /// Fetch the version list and start tracking every version. Unless
    /// disabled, both caches of each version not seen before are validated;
    /// the state of versions already loaded is left alone.
    #[instrument(skip(self))]
    pub async fn load_versions(&self) -> Result<Vec<VersionEntry>> {
        let added = self.refresh_versions().await?;
        if self.settings.validate_on_load {
            self.validate_all(&added).await;
        }
        Ok(self.versions().clone())
    }

    /// Import a build from a manifest, then reload the list and validate
    /// whatever it added. Returns the new build's label.
    #[instrument(skip(self))]
    pub async fn import_build(&self, uri: &str) -> Result<String> {
        let label = match self.backend.import_version(uri).await {
            Ok(label) => label,
            Err(err) => {
                self.notify.notify(Notice::error(format!("Failed to import build: {err}")));
                return Err(err).or_raise(|| ErrorKind::Backend);
            },
        };
        let added = self.refresh_versions().await?;
        self.validate_all(&added).await;
        self.notify.notify(Notice::success(format!("Imported build {label}")));
        Ok(label)
    }

    /// Add a bare build by name and asset location, then reload the list and
    /// validate whatever it added.
    #[instrument(skip(self))]
    pub async fn add_build(&self, name: &str, asset_url: &str) -> Result<()> {
        if let Err(err) = self.backend.add_version_manual(name, asset_url).await {
            self.notify.notify(Notice::error(format!("Failed to add build: {err}")));
            return Err(err).or_raise(|| ErrorKind::Backend);
        }
        let added = self.refresh_versions().await?;
        self.validate_all(&added).await;
        self.notify.notify(Notice::success(format!("Added build {name}")));
        Ok(())
    }

    /// Start a validation pass.
    ///
    /// A request refused because there is no cache (or no such version) is
    /// completed as empty rather than reported as an error. Any other failure
    /// leaves the pair re-armed until the next pass.
    #[instrument(skip(self), fields(%uuid, %kind, operation = %Operation::Validate))]
    pub async fn validate(&self, uuid: Uuid, kind: CacheKind) -> Ticket {
        let (ticket, _) = self.store().open_pass(uuid, kind, Rearm::Reset);
        match self.backend.validate_cache(uuid, kind).await {
            Ok(ValidationAck::Spawned) => tracing::debug!("Validation started"),
            Ok(ValidationAck::Completed { corrupt }) => {
                let outcome = if corrupt { PassOutcome::Corrupt } else { PassOutcome::Verified };
                self.reconciler.complete(&ticket, outcome);
            },
            Err(err) if means_absent(&err) => {
                tracing::debug!(error = %err, "Validation request failed; treating cache as absent");
                self.reconciler.complete(&ticket, PassOutcome::Absent);
            },
            Err(err) => tracing::warn!(error = %err, "Validation request failed; cache state unknown"),
        }
        ticket
    }

    /// Ask the backend how much of a cache is on disk, through the coarse
    /// protocol's counter. `None` means the size is not known: either no
    /// cache exists, or the query failed and the pair stays re-armed.
    #[instrument(skip(self), fields(%uuid, %kind, operation = %Operation::RefreshSize))]
    pub async fn refresh_size(&self, uuid: Uuid, kind: CacheKind) -> Option<u64> {
        let (ticket, _) = self.store().open_pass(uuid, kind, Rearm::Reset);
        match self.backend.get_cache_size(uuid, kind).await {
            Ok(bytes) => {
                self.reconciler.measure(&ticket, bytes);
                Some(bytes)
            },
            Err(err) if means_absent(&err) => {
                tracing::debug!(error = %err, "Size query failed; treating cache as absent");
                self.reconciler.complete(&ticket, PassOutcome::Absent);
                None
            },
            Err(err) => {
                tracing::warn!(error = %err, "Size query failed; cache state unknown");
                None
            },
        }
    }

    #[instrument(skip(self), fields(%uuid, %kind, operation = %Operation::OpenFolder))]
    pub async fn open_folder(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        if let Err(err) = self.backend.open_folder_for_version(uuid, kind).await {
            let operation = Operation::OpenFolder;
            self.notify.notify(Notice::error(format!("Failed to {operation} for the {kind} cache: {err}")));
            return Err(err).or_raise(|| ErrorKind::Backend);
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn claim(&self, version: &VersionEntry, kind: CacheKind, operation: Operation) -> Result<InFlightGuard> {
        match self.in_flight.acquire(version.uuid, kind, operation) {
            Some(guard) => Ok(guard),
            None => {
                self.notify.notify(Notice::error(format!(
                    "Another operation is in progress for the {kind} cache of {}",
                    version.label()
                )));
                exn::bail!(ErrorKind::Busy(version.uuid, kind))
            },
        }
    }

    async fn confirmed(&self, prompt: &Prompt) -> bool {
        if !self.settings.require_confirmation {
            return true;
        }
        let accepted = self.confirm.confirm(prompt).await;
        if !accepted {
            tracing::info!(prompt = %prompt.message, "Operation declined");
        }
        accepted
    }

    /// Optimistically empty a cache, then send the delete. The caller holds
    /// the pair's in-flight guard.
    async fn wipe(&self, version: &VersionEntry, kind: CacheKind, operation: Operation) -> Result<()> {
        let uuid = version.uuid;
        let (verb, past) = match operation {
            Operation::Clear => ("clear", "cleared"),
            _ => ("delete", "deleted"),
        };
        let (ticket, prior) = self.store().seal(uuid, kind, VersionCacheState::empty_done());
        match self.backend.delete_cache(uuid, kind).await {
            Ok(()) => {
                tracing::info!(%uuid, %kind, %operation, "Cache delete accepted");
                self.notify.notify(Notice::success(format!(
                    "{} cache for {} {past} successfully",
                    title(kind),
                    version.label()
                )));
                Ok(())
            },
            Err(err) => {
                let reverted = self.store().revert(&ticket, prior);
                tracing::error!(%uuid, %kind, %operation, error = %err, reverted, "Cache delete rejected");
                let label = version.label();
                self.notify.notify(Notice::error(format!("Failed to {verb} {kind} cache for {label}: {err}")));
                Err(err).or_raise(|| ErrorKind::Backend)
            },
        }
    }

    async fn destroy(&self, uuid: Uuid, kind: CacheKind, operation: Operation) -> Result<Outcome> {
        let version = self.version(uuid)?;
        let state = self.store().get(uuid, kind);
        let (allowed, verb, action) = match operation {
            Operation::Clear => (facts::can_clear(&state), "clear", "Clear"),
            _ => (facts::can_delete(&state), "delete", "Delete"),
        };
        if !allowed {
            tracing::debug!(%uuid, %kind, %operation, phase = %state.phase(), "Operation not enabled");
            exn::bail!(ErrorKind::NotAllowed(operation, uuid));
        }
        let _guard = self.claim(&version, kind, operation)?;
        let prompt = Prompt::new(
            format!("Are you sure you want to {verb} the {kind} cache for {}?", version.label()),
            action,
        );
        if !self.confirmed(&prompt).await {
            return Ok(Outcome::Declined);
        }
        self.wipe(&version, kind, operation).await?;
        Ok(Outcome::Sent)
    }

    /// Delete a game cache. The state reads "validated, empty" immediately.
    #[instrument(skip(self), fields(%uuid))]
    pub async fn clear_game_cache(&self, uuid: Uuid) -> Result<Outcome> {
        self.destroy(uuid, CacheKind::Game, Operation::Clear).await
    }

    /// Delete an offline cache. The state reads "validated, empty" immediately.
    #[instrument(skip(self), fields(%uuid))]
    pub async fn delete_offline_cache(&self, uuid: Uuid) -> Result<Outcome> {
        self.destroy(uuid, CacheKind::Offline, Operation::Delete).await
    }

    async fn fetch(&self, uuid: Uuid, repair: bool) -> Result<Outcome> {
        let kind = CacheKind::Offline;
        let operation = if repair { Operation::Repair } else { Operation::Download };
        let version = self.version(uuid)?;
        let state = self.store().get(uuid, kind);
        let allowed = match repair {
            true => facts::can_repair(&state),
            false => facts::can_download(&state, &version),
        };
        if !allowed {
            tracing::debug!(%uuid, %operation, phase = %state.phase(), "Operation not enabled");
            exn::bail!(ErrorKind::NotAllowed(operation, uuid));
        }
        let _guard = self.claim(&version, kind, operation)?;
        let (ticket, prior) = self.store().open_pass(uuid, kind, Rearm::KeepItems);
        match self.backend.download_cache(uuid, kind, repair).await {
            Ok(()) => {
                tracing::info!(%uuid, %operation, "Offline cache command accepted");
                self.notify.notify(Notice::info(format!("Offline cache {operation} started for {}", version.label())));
                Ok(Outcome::Sent)
            },
            Err(err) => {
                let reverted = self.store().revert(&ticket, prior);
                tracing::error!(%uuid, %operation, error = %err, reverted, "Offline cache command rejected");
                self.notify.notify(Notice::error(format!(
                    "Failed to start offline cache {operation} for {}: {err}",
                    version.label()
                )));
                Err(err).or_raise(|| ErrorKind::Backend)
            },
        }
    }

    /// Download the offline cache. Progress arrives through backend events;
    /// the item map is left alone until then.
    #[instrument(skip(self), fields(%uuid))]
    pub async fn download_offline_cache(&self, uuid: Uuid) -> Result<Outcome> {
        self.fetch(uuid, false).await
    }

    /// Re-fetch the damaged items of the offline cache.
    #[instrument(skip(self), fields(%uuid))]
    pub async fn repair_offline_cache(&self, uuid: Uuid) -> Result<Outcome> {
        self.fetch(uuid, true).await
    }

    /// Remove a version from the list, optionally deleting both its caches
    /// first. Cache deletes are best effort: the version is removed even if
    /// one is rejected.
    #[instrument(skip(self), fields(%uuid))]
    pub async fn remove_version(&self, uuid: Uuid, clear_caches: bool) -> Result<Outcome> {
        let version = self.version(uuid)?;
        let game = self.store().get(uuid, CacheKind::Game);
        let offline = self.store().get(uuid, CacheKind::Offline);
        if !facts::can_remove(&version, &self.settings.protected, &game, &offline) {
            tracing::debug!(%uuid, game = %game.phase(), offline = %offline.phase(), "Remove not enabled");
            exn::bail!(ErrorKind::NotAllowed(Operation::Remove, uuid));
        }
        let _game = self.claim(&version, CacheKind::Game, Operation::Remove)?;
        let _offline = self.claim(&version, CacheKind::Offline, Operation::Remove)?;
        let prompt = Prompt::new(
            format!(
                "Are you sure you want to remove build {}? \
                 It will be fetched again automatically if a server requires it.",
                version.label()
            ),
            if clear_caches { "Remove and Clear Caches" } else { "Remove" },
        );
        if !self.confirmed(&prompt).await {
            return Ok(Outcome::Declined);
        }

        if clear_caches {
            for (kind, operation) in [(CacheKind::Game, Operation::Clear), (CacheKind::Offline, Operation::Delete)] {
                if !facts::can_delete(&self.store().get(uuid, kind)) {
                    continue;
                }
                if let Err(err) = self.wipe(&version, kind, operation).await {
                    tracing::warn!(%uuid, %kind, error = %err, "Removing build despite failed cache delete");
                }
            }
        }

        self.removed_mut().insert(uuid);
        self.store().forget(uuid);
        tracing::info!(%uuid, clear_caches, "Build removed");
        self.notify.notify(Notice::success(format!("Removed build {}", version.label())));
        Ok(Outcome::Sent)
    }

    async fn destroy_all(&self, kind: CacheKind, operation: Operation, prompt: Prompt) -> BatchOutcome {
        if !self.confirmed(&prompt).await {
            return BatchOutcome::Declined;
        }
        let eligible: Vec<VersionEntry> = self
            .known_versions()
            .into_iter()
            .filter(|version| {
                let state = self.store().get(version.uuid, kind);
                state.done && !state.is_empty()
            })
            .collect();
        let results = join_all(eligible.iter().map(|version| async move {
            let _guard = self.claim(version, kind, operation)?;
            self.wipe(version, kind, operation).await
        }))
        .await;
        let sent = results.iter().filter(|result| result.is_ok()).count();
        let failed = results.len() - sent;
        tracing::info!(%kind, %operation, sent, failed, "Batch cache delete finished");
        BatchOutcome::Done { sent, failed }
    }

    /// Clear every game cache that a finished pass found content in, hidden
    /// builds included.
    #[instrument(skip(self))]
    pub async fn clear_all_game_caches(&self) -> BatchOutcome {
        let prompt = Prompt::new("Are you sure you want to clear all game caches?", "Clear All");
        self.destroy_all(CacheKind::Game, Operation::Clear, prompt).await
    }

    /// Delete every offline cache that a finished pass found content in,
    /// hidden builds included.
    #[instrument(skip(self))]
    pub async fn delete_all_offline_caches(&self) -> BatchOutcome {
        let prompt = Prompt::new("Are you sure you want to delete all offline caches?", "Delete All");
        self.destroy_all(CacheKind::Offline, Operation::Delete, prompt).await
    }
}

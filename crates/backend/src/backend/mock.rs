//! In-memory backend for testing.

use super::{EventStream, ValidationAck};
use crate::Backend;
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use async_trait::async_trait;
use buildcache_model::event::BackendEvent;
use buildcache_model::{CacheKind, Uuid, VersionEntry};
use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock, broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Command names, for scripting failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    GetVersions,
    GetCacheSize,
    Validate,
    Delete,
    Download,
    Import,
    AddManual,
    OpenFolder,
}

/// A recorded command invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    GetVersions,
    GetCacheSize(Uuid, CacheKind),
    Validate(Uuid, CacheKind),
    Delete(Uuid, CacheKind),
    Download { uuid: Uuid, kind: CacheKind, repair: bool },
    Import(String),
    AddManual { name: String, asset_url: String },
    OpenFolder(Uuid, CacheKind),
}

/// In-memory backend for testing.
///
/// Versions, cache sizes and corruption are plain in-memory state behind
/// async locks, so all trait methods work on `&self`. Events are only pushed
/// when a test calls [`emit`](Self::emit), which keeps the ordering of
/// backend events fully under the test's control.
///
/// # Examples
///
/// ```
/// use buildcache_backend::backend::{Call, MockBackend};
/// use buildcache_backend::Backend;
/// use buildcache_model::{CacheKind, Uuid, VersionEntry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let uuid = Uuid::new_v4();
/// let backend = MockBackend::with_versions([VersionEntry::new(uuid)]);
/// backend.set_size(uuid, CacheKind::Game, 1024).await;
/// assert_eq!(backend.get_cache_size(uuid, CacheKind::Game).await?, 1024);
/// assert_eq!(backend.calls().await, vec![Call::GetCacheSize(uuid, CacheKind::Game)]);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    coarse: bool,
    versions: RwLock<Vec<VersionEntry>>,
    manifests: RwLock<HashMap<String, VersionEntry>>,
    sizes: RwLock<HashMap<(Uuid, CacheKind), u64>>,
    corrupt: RwLock<HashSet<(Uuid, CacheKind)>>,
    failures: RwLock<HashMap<Command, ErrorKind>>,
    running: Mutex<HashSet<(Uuid, CacheKind)>>,
    calls: Mutex<Vec<Call>>,
    paused: watch::Sender<bool>,
    events: std::sync::Mutex<Option<broadcast::Sender<BackendEvent>>>,
}

impl MockBackend {
    /// Create a mock backend that knows about the given versions.
    pub fn with_versions(versions: impl IntoIterator<Item = VersionEntry>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name: "mock".to_string(),
            coarse: false,
            versions: RwLock::new(versions.into_iter().collect()),
            manifests: RwLock::new(HashMap::new()),
            sizes: RwLock::new(HashMap::new()),
            corrupt: RwLock::new(HashSet::new()),
            failures: RwLock::new(HashMap::new()),
            running: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            paused: watch::Sender::new(false),
            events: std::sync::Mutex::new(Some(events)),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Behave like a legacy backend: `validate_cache` only resolves once the
    /// pass is finished, reporting corruption in its result.
    pub fn coarse(mut self) -> Self {
        self.coarse = true;
        self
    }

    /// Make a manifest importable through [`import_version`](Backend::import_version).
    pub async fn add_manifest(&self, uri: impl Into<String>, version: VersionEntry) {
        self.manifests.write().await.insert(uri.into(), version);
    }

    pub async fn set_size(&self, uuid: Uuid, kind: CacheKind, bytes: u64) {
        self.sizes.write().await.insert((uuid, kind), bytes);
    }

    pub async fn set_corrupt(&self, uuid: Uuid, kind: CacheKind, corrupt: bool) {
        let mut guard = self.corrupt.write().await;
        match corrupt {
            true => guard.insert((uuid, kind)),
            false => guard.remove(&(uuid, kind)),
        };
    }

    /// Make every future call of `command` fail with `error`.
    pub async fn fail(&self, command: Command, error: ErrorKind) {
        self.failures.write().await.insert(command, error);
    }

    pub async fn succeed(&self, command: Command) {
        self.failures.write().await.remove(&command);
    }

    /// Mark an operation as already running in the backend, so mutating
    /// commands for that pair are refused with [`ErrorKind::Busy`].
    pub async fn hold(&self, uuid: Uuid, kind: CacheKind) {
        self.running.lock().await.insert((uuid, kind));
    }

    pub async fn release(&self, uuid: Uuid, kind: CacheKind) {
        self.running.lock().await.remove(&(uuid, kind));
    }

    /// Block every command (after it has been recorded) until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Push an event to every current subscriber.
    pub fn emit(&self, event: BackendEvent) {
        let guard = self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No subscribers is fine: events are fire-and-forget.
            _ = sender.send(event);
        }
    }

    /// End every event stream, as if the backend process went away.
    pub fn close_events(&self) {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
    }

    /// Every command received so far, in order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: Call, command: Command) -> Result<()> {
        self.calls.lock().await.push(call);
        let mut paused = self.paused.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        _ = paused.wait_for(|paused| !*paused).await;
        if let Some(error) = self.failures.read().await.get(&command) {
            exn::bail!(error.clone());
        }
        Ok(())
    }

    async fn known(&self, uuid: Uuid) -> Result<()> {
        match self.versions.read().await.iter().any(|v| v.uuid == uuid) {
            true => Ok(()),
            false => exn::bail!(ErrorKind::VersionNotFound(uuid)),
        }
    }

    async fn idle(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        match self.running.lock().await.contains(&(uuid, kind)) {
            true => exn::bail!(ErrorKind::Busy),
            false => Ok(()),
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::with_versions([])
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_versions(&self) -> Result<Vec<VersionEntry>> {
        self.record(Call::GetVersions, Command::GetVersions).await?;
        Ok(self.versions.read().await.clone())
    }

    async fn get_cache_size(&self, uuid: Uuid, kind: CacheKind) -> Result<u64> {
        self.record(Call::GetCacheSize(uuid, kind), Command::GetCacheSize).await?;
        self.known(uuid).await?;
        match self.sizes.read().await.get(&(uuid, kind)) {
            Some(size) => Ok(*size),
            None => exn::bail!(ErrorKind::NoCache(uuid, kind)),
        }
    }

    async fn validate_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<ValidationAck> {
        self.record(Call::Validate(uuid, kind), Command::Validate).await?;
        self.known(uuid).await?;
        if !self.coarse {
            return Ok(ValidationAck::Spawned);
        }
        let corrupt = self.corrupt.read().await.contains(&(uuid, kind));
        Ok(ValidationAck::Completed { corrupt })
    }

    async fn delete_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        self.record(Call::Delete(uuid, kind), Command::Delete).await?;
        self.known(uuid).await?;
        self.idle(uuid, kind).await?;
        self.sizes.write().await.remove(&(uuid, kind));
        self.corrupt.write().await.remove(&(uuid, kind));
        Ok(())
    }

    async fn download_cache(&self, uuid: Uuid, kind: CacheKind, repair: bool) -> Result<()> {
        self.record(Call::Download { uuid, kind, repair }, Command::Download).await?;
        if !kind.is_offline() {
            exn::bail!(ErrorKind::Unsupported(format!("{kind} cache download")));
        }
        self.known(uuid).await?;
        self.idle(uuid, kind).await?;
        Ok(())
    }

    async fn import_version(&self, uri: &str) -> Result<String> {
        self.record(Call::Import(uri.to_string()), Command::Import).await?;
        let Some(version) = self.manifests.read().await.get(uri).cloned() else {
            exn::bail!(ErrorKind::Rejected("invalid manifest".to_string()));
        };
        let mut versions = self.versions.write().await;
        if versions.iter().any(|v| v.uuid == version.uuid) {
            exn::bail!(ErrorKind::Rejected("version already imported".to_string()));
        }
        let label = version.label();
        versions.push(version);
        Ok(label)
    }

    async fn add_version_manual(&self, name: &str, asset_url: &str) -> Result<()> {
        let call = Call::AddManual { name: name.to_string(), asset_url: asset_url.to_string() };
        self.record(call, Command::AddManual).await?;
        self.versions.write().await.push(VersionEntry::new(Uuid::new_v4()).with_name(name));
        Ok(())
    }

    async fn open_folder_for_version(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        self.record(Call::OpenFolder(uuid, kind), Command::OpenFolder).await?;
        self.known(uuid).await
    }

    fn events(&self) -> EventStream<'_> {
        let guard = self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(mut receiver) = guard.as_ref().map(broadcast::Sender::subscribe) else {
            return Box::pin(futures::stream::empty());
        };
        Box::pin(stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Mock event subscriber lagged");
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

//! Backend trait and implementations.
//!
//! The launcher's cache worker runs out-of-process: it does the file I/O,
//! hashing and downloads, and the state engine only sees it through this
//! trait. Commands are request/response; progress is pushed back as a stream
//! of [`BackendEvent`]s that fans out to every subscriber.

#[cfg(feature = "mock")]
mod mock;
mod ro;

#[cfg(feature = "mock")]
pub use self::mock::{Call, Command, MockBackend};
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;
use buildcache_model::event::BackendEvent;
use buildcache_model::{CacheKind, Uuid, VersionEntry};
use futures::Stream;
use std::pin::Pin;

pub type EventStream<'a> = Pin<Box<dyn Stream<Item = BackendEvent> + Send + 'a>>;

/// How the backend acknowledged a `validate_cache` request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationAck {
    /// The pass was started in the background. Progress and completion
    /// arrive as itemized `cache_progress` events.
    Spawned,
    /// The request only resolved once the pass finished (coarse protocol).
    /// This resolution is the pass's terminal event.
    Completed { corrupt: bool },
}

/// Unified interface to the cache worker.
///
/// Mutating commands (`delete_cache`, `download_cache`) return as soon as the
/// backend has accepted them; their effect on disk is reported through
/// [`events()`](Self::events).
///
/// # Examples
///
/// ```
/// use buildcache_backend::{Backend, error::Result};
/// use buildcache_model::{CacheKind, Uuid};
///
/// async fn has_offline_cache(backend: &dyn Backend, uuid: Uuid) -> Result<bool> {
///     // Failure means "no cache exists yet", not a fatal error.
///     Ok(backend.get_cache_size(uuid, CacheKind::Offline).await.is_ok_and(|size| size > 0))
/// }
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name of the backend implementation (for logging only).
    fn name(&self) -> &str;

    /// All builds the backend knows about, hidden ones included.
    async fn get_versions(&self) -> Result<Vec<VersionEntry>>;

    /// Total bytes on disk for one cache.
    ///
    /// Fails with [`NoCache`](crate::error::ErrorKind::NoCache) when nothing
    /// has been cached yet.
    async fn get_cache_size(&self, uuid: Uuid, kind: CacheKind) -> Result<u64>;

    /// Start (or run) a validation pass over one cache.
    async fn validate_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<ValidationAck>;

    /// Delete one cache from disk.
    async fn delete_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<()>;

    /// Download one cache, or with `repair`, re-fetch only the damaged items.
    async fn download_cache(&self, uuid: Uuid, kind: CacheKind, repair: bool) -> Result<()>;

    /// Import a build from its manifest at `uri` and add it to the list.
    ///
    /// Returns the new build's label. Fails with
    /// [`Rejected`](crate::error::ErrorKind::Rejected) for an invalid manifest
    /// or a build that is already known.
    async fn import_version(&self, uri: &str) -> Result<String>;

    /// Add a bare build with only a name and an asset location.
    async fn add_version_manual(&self, name: &str, asset_url: &str) -> Result<()>;

    /// Reveal a cache directory in the system file manager.
    async fn open_folder_for_version(&self, uuid: Uuid, kind: CacheKind) -> Result<()>;

    /// Subscribe to pushed progress events.
    ///
    /// Each call returns an independent subscription. Events emitted before
    /// the call are not replayed.
    fn events(&self) -> EventStream<'_>;
}

//! Read-only backend.
//!
//! This module provides a backend implementation that wraps another one and
//! prevents destructive commands from executing. Cache commands still report
//! success; changes to the build list are refused.

use crate::backend::{EventStream, ValidationAck};
use crate::error::{ErrorKind, Result};
use crate::{Backend, BackendHandle};
use async_trait::async_trait;
use buildcache_model::{CacheKind, Uuid, VersionEntry};

/// Read-only backend.
///
/// Wraps another backend and silently drops every command that would change
/// what is on disk, logging an [`info event`](tracing::Event) instead.
/// Validation and queries pass through unchanged. Adding builds fails with
/// [`Rejected`](crate::error::ErrorKind::Rejected), since there is no label
/// or entry to report back.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Backend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_versions(&self) -> Result<Vec<VersionEntry>> {
        self.inner.get_versions().await
    }

    async fn get_cache_size(&self, uuid: Uuid, kind: CacheKind) -> Result<u64> {
        self.inner.get_cache_size(uuid, kind).await
    }

    async fn validate_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<ValidationAck> {
        self.inner.validate_cache(uuid, kind).await
    }

    async fn delete_cache(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        tracing::info!(%uuid, %kind, "Skipping cache delete during read-only mode");
        Ok(())
    }

    async fn download_cache(&self, uuid: Uuid, kind: CacheKind, repair: bool) -> Result<()> {
        tracing::info!(%uuid, %kind, repair, "Skipping cache download during read-only mode");
        Ok(())
    }

    async fn import_version(&self, uri: &str) -> Result<String> {
        tracing::info!(uri, "Refusing build import during read-only mode");
        exn::bail!(ErrorKind::Rejected("read-only mode".to_string()))
    }

    async fn add_version_manual(&self, name: &str, asset_url: &str) -> Result<()> {
        tracing::info!(name, asset_url, "Refusing manual build during read-only mode");
        exn::bail!(ErrorKind::Rejected("read-only mode".to_string()))
    }

    async fn open_folder_for_version(&self, uuid: Uuid, kind: CacheKind) -> Result<()> {
        self.inner.open_folder_for_version(uuid, kind).await
    }

    fn events(&self) -> EventStream<'_> {
        self.inner.events()
    }
}

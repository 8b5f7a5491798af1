use buildcache_backend::BackendHandle;
use buildcache_backend::backend::ReadOnlyBackend;
use buildcache_config::Config;
use buildcache_model::ProtectedVersions;
use std::sync::Arc;

/// The parts of [`Config`] the coordinator acts on.
#[derive(Clone, Debug)]
pub struct Settings {
    pub protected: ProtectedVersions,
    pub require_confirmation: bool,
    pub validate_on_load: bool,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            protected: config.protected(),
            require_confirmation: config.require_confirmation,
            validate_on_load: config.validate_on_load,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Wrap `backend` according to `config`: in dry-run mode destructive
/// commands are logged and skipped.
pub fn backend_for(config: &Config, backend: BackendHandle) -> BackendHandle {
    if config.dry_run {
        tracing::info!(backend = backend.name(), "Dry run: destructive cache commands will not be sent");
        return Arc::new(ReadOnlyBackend::new(backend));
    }
    backend
}

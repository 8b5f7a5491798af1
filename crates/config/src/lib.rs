//! Configuration for buildcache.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults.
//! 2. A TOML file: an explicit path, or `config.toml` in the platform
//!    configuration directory.
//! 3. Environment variables prefixed `BUILDCACHE_` (e.g.
//!    `BUILDCACHE_DRY_RUN=true`).

pub mod error;

use crate::error::{ErrorKind, Result};
use buildcache_model::ProtectedVersions;
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ENV_PREFIX: &str = "BUILDCACHE_";
const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Builds that must never be removed.
    pub protected_versions: Vec<Uuid>,
    /// Ask before every destructive operation.
    pub require_confirmation: bool,
    /// Log destructive commands instead of sending them.
    pub dry_run: bool,
    /// Validate both caches of every build as soon as the version list loads.
    pub validate_on_load: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protected_versions: Vec::new(),
            require_confirmation: true,
            dry_run: false,
            validate_on_load: true,
        }
    }
}

impl Config {
    /// Load configuration from every source.
    ///
    /// Without an explicit `path`, the platform default file is used if it
    /// exists; a missing file is not an error either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path()?,
        };
        let config = Self::from_figment(Self::figment(&path))?;
        tracing::debug!(
            path = %path.display(),
            protected = config.protected_versions.len(),
            dry_run = config.dry_run,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The layered provider chain, for callers that want to add their own
    /// layers on top.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Invalid)
    }

    pub fn protected(&self) -> ProtectedVersions {
        self.protected_versions.iter().copied().collect()
    }
}

/// `config.toml` in the platform configuration directory.
pub fn default_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "buildcache").ok_or_raise(|| ErrorKind::NoConfigDir)?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

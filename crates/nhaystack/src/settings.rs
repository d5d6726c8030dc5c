//! Settings for the nhaystack binary
//!
//! Layered with figment: built-in defaults, then `nhaystack.toml`, then
//! `NHAYSTACK_*` environment variables (`__` separates nested keys, e.g.
//! `NHAYSTACK_CACHE__ROOT=slot:/Drivers`). Command line flags are applied on
//! top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use haystack_cache::CacheConfig;

/// Default settings file name, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "nhaystack.toml";

const DEFAULT_REBUILD_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Station snapshot document to index
    pub snapshot: PathBuf,
    /// Upper bound on a single rebuild
    pub rebuild_timeout_secs: u64,
    pub cache: CacheConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("station.toml"),
            rebuild_timeout_secs: DEFAULT_REBUILD_TIMEOUT_SECS,
            cache: CacheConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (missing file is fine) and the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("NHAYSTACK_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn rebuild_timeout(&self) -> Duration {
        Duration::from_secs(self.rebuild_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rebuild_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "rebuild_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.cache.nav_name_format.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "cache.nav_name_format".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

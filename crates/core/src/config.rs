//! Session configuration and an injectable config service.
//!
//! `ConfigService` is constructed explicitly and passed to whatever needs
//! configuration. The cached value only changes when `refresh()` is called.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::limits::{ACTIVITY_DEBOUNCE, INACTIVITY_WINDOW, STORAGE_KEY_PREFIX, VALIDATION_INTERVAL};
use crate::policy::TimeoutPolicy;

/// Session guard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Prefix for metadata keys in local storage
    #[serde(default = "default_storage_key_prefix")]
    pub storage_key_prefix: String,
    /// Absolute and inactivity caps per user type
    #[serde(default)]
    pub timeouts: TimeoutPolicy,
    /// Minimum spacing between activity writes, in seconds
    #[serde(default = "default_activity_debounce_secs")]
    pub activity_debounce_secs: u64,
    /// Provider re-validation interval, in seconds
    #[serde(default = "default_validation_interval_secs")]
    pub validation_interval_secs: u64,
    /// Idle window before a forced sign-out, in seconds
    #[serde(default = "default_inactivity_window_secs")]
    pub inactivity_window_secs: u64,
}

fn default_storage_key_prefix() -> String {
    STORAGE_KEY_PREFIX.to_string()
}

fn default_activity_debounce_secs() -> u64 {
    ACTIVITY_DEBOUNCE.as_secs()
}

fn default_validation_interval_secs() -> u64 {
    VALIDATION_INTERVAL.as_secs()
}

fn default_inactivity_window_secs() -> u64 {
    INACTIVITY_WINDOW.as_secs()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key_prefix: default_storage_key_prefix(),
            timeouts: TimeoutPolicy::default(),
            activity_debounce_secs: default_activity_debounce_secs(),
            validation_interval_secs: default_validation_interval_secs(),
            inactivity_window_secs: default_inactivity_window_secs(),
        }
    }
}

impl SessionConfig {
    pub fn activity_debounce(&self) -> Duration {
        Duration::from_secs(self.activity_debounce_secs)
    }

    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }

    pub fn inactivity_window(&self) -> Duration {
        Duration::from_secs(self.inactivity_window_secs)
    }

    /// Rejects values that would make the runtime spin or never fire.
    pub fn validate(&self) -> Result<()> {
        if self.validation_interval_secs == 0 {
            return Err(Error::config("validation_interval_secs must be positive"));
        }
        if self.inactivity_window_secs == 0 {
            return Err(Error::config("inactivity_window_secs must be positive"));
        }
        for (name, t) in [("team", self.timeouts.team), ("regular", self.timeouts.regular)] {
            if t.session_ms <= 0 || t.inactivity_ms <= 0 {
                return Err(Error::config(format!("{} timeouts must be positive", name)));
            }
        }
        Ok(())
    }
}

/// Produces a fresh `SessionConfig`.
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<SessionConfig>;
}

impl<F> ConfigLoader for F
where
    F: Fn() -> Result<SessionConfig> + Send + Sync,
{
    fn load(&self) -> Result<SessionConfig> {
        self()
    }
}

/// Loads from defaults, an optional TOML file, then environment variables.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    /// TOML file, e.g. `config/session.toml`
    pub file: Option<PathBuf>,
    /// Environment prefix, e.g. `SESSION`
    pub env_prefix: String,
}

impl SourceLoader {
    pub fn new(file: Option<PathBuf>, env_prefix: impl Into<String>) -> Self {
        Self {
            file,
            env_prefix: env_prefix.into(),
        }
    }
}

impl ConfigLoader for SourceLoader {
    fn load(&self) -> Result<SessionConfig> {
        let defaults = ::config::Config::try_from(&SessionConfig::default())
            .map_err(|e| Error::config(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(file) = &self.file {
            builder = builder.add_source(
                ::config::File::from(file.as_path())
                    .required(false)
                    .format(::config::FileFormat::Toml),
            );
        }

        let config: SessionConfig = builder
            .add_source(
                ::config::Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }
}

/// Cached configuration with explicit refresh.
pub struct ConfigService {
    loader: Box<dyn ConfigLoader>,
    current: RwLock<Arc<SessionConfig>>,
}

impl ConfigService {
    /// Loads the initial configuration.
    pub fn new(loader: impl ConfigLoader + 'static) -> Result<Self> {
        let initial = loader.load()?;
        Ok(Self {
            loader: Box::new(loader),
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Service that always serves `config`.
    pub fn fixed(config: SessionConfig) -> Self {
        let cached = config.clone();
        Self {
            loader: Box::new(move || -> Result<SessionConfig> { Ok(cached.clone()) }),
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Current cached configuration.
    pub fn current(&self) -> Arc<SessionConfig> {
        self.current.read().clone()
    }

    /// Reloads from the loader. On failure the previous value stays cached.
    pub fn refresh(&self) -> Result<Arc<SessionConfig>> {
        match self.loader.load() {
            Ok(config) => {
                let config = Arc::new(config);
                *self.current.write() = config.clone();
                info!("Session configuration refreshed");
                Ok(config)
            }
            Err(e) => {
                warn!(error = %e, "Config refresh failed, keeping previous configuration");
                Err(e)
            }
        }
    }
}

use crate::{RefreshConfig, RefreshErrorPolicy, RefreshTrigger, Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Store configuration, usually read from a TOML file:
///
/// ```toml
/// dir = "testdata/images"
///
/// [refresh]
/// interval_ms = 2000
/// trigger = "additions"
/// on_error = "log_and_retry"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory whose files are loaded into the catalog
    pub dir: PathBuf,

    /// Periodic rescan; `None` loads once and never refreshes
    #[serde(default)]
    pub refresh: Option<RefreshSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshSettings {
    pub interval_ms: u64,

    #[serde(default)]
    pub trigger: RefreshTrigger,

    #[serde(default)]
    pub on_error: RefreshErrorPolicy,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from(RefreshConfig::default())
    }
}

impl From<RefreshConfig> for RefreshSettings {
    fn from(config: RefreshConfig) -> Self {
        Self {
            interval_ms: whole_millis_rounded_up(config.interval),
            trigger: config.trigger,
            on_error: config.on_error,
        }
    }
}

/// Sub-millisecond remainders round up so a non-zero interval never becomes 0ms.
fn whole_millis_rounded_up(interval: Duration) -> u64 {
    u64::try_from(interval.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl From<RefreshSettings> for RefreshConfig {
    fn from(settings: RefreshSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms),
            trigger: settings.trigger,
            on_error: settings.on_error,
        }
    }
}

impl StoreConfig {
    /// Load once, never refresh.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = Some(refresh.into());
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|err| StoreError::invalid_config(format!("parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file. A relative `dir` is resolved against the
    /// file's parent directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| StoreError::io(path, "read config", err))?;
        let mut config = Self::from_toml_str(&raw)?;
        if config.dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.dir = parent.join(&config.dir);
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn refresh_config(&self) -> Option<RefreshConfig> {
        self.refresh.map(RefreshConfig::from)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(StoreError::invalid_config("dir must not be empty"));
        }
        if let Some(refresh) = self.refresh_config() {
            refresh.validate()?;
        }
        Ok(())
    }
}

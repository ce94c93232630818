//! TOML runtime configuration
//!
//! Describes which modules the `moduleflow` binary hosts and which built-in
//! extensions are attached to them. The file is looked up at
//! `<config dir>/Moduleflow/moduleflow.toml` unless `--config-file` names one
//! explicitly, in which case it must exist.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [defaults]
//! thread_count = 2
//!
//! [watchdog]
//! enabled = true
//! interval_ms = 500
//!
//! [[modules]]
//! name = "ticker"
//! kind = "counter"
//! timer = { interval_ms = 250 }
//!
//! [[modules]]
//! name = "flaky"
//! kind = "failing"
//! retry = { delay_ms = 100, max_retries = 2 }
//! settings = { fail_every = 3 }
//! ```

use crate::core::error_handling::ContextualError;
use crate::module::api::ControllerConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while locating, reading or validating the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            ConfigError::Parse { .. } | ConfigError::Invalid { .. }
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Parse { message, .. } | ConfigError::Invalid { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    /// Log file path; "none" or "-" disables file logging
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "scheduler".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub name: String,
    pub interval_ms: u64,
    pub max_restarts: u32,
    /// Modules to supervise; empty means every configured module
    pub supervise: Vec<String>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "watchdog".to_string(),
            interval_ms: 1000,
            max_restarts: 3,
            supervise: Vec::new(),
        }
    }
}

impl WatchdogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub delay_ms: u64,
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerConfig {
    pub interval_ms: u64,
    /// Defaults to `interval_ms`
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,
}

/// One `[[modules]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub background: Option<bool>,
    /// Attach the drain-before-stop extension
    #[serde(default)]
    pub drain_before_stop: bool,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub timer: Option<TimerConfig>,
    /// Kind-specific settings
    #[serde(default)]
    pub settings: toml::Table,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            threads: None,
            background: None,
            drain_before_stop: false,
            retry: None,
            timer: None,
            settings: toml::Table::new(),
        }
    }

    /// Worker configuration, falling back to `defaults` per field
    pub fn controller_config(&self, defaults: ControllerConfig) -> ControllerConfig {
        ControllerConfig {
            thread_count: self.threads.unwrap_or(defaults.thread_count),
            background: self.background.unwrap_or(defaults.background),
        }
    }

    /// Integer setting, or `default` when absent
    pub fn setting_u64(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.settings.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| {
                    ConfigError::invalid(format!(
                        "module '{}': setting '{}' must be a non-negative integer",
                        self.name, key
                    ))
                }),
        }
    }

    /// String setting, or `default` when absent
    pub fn setting_str(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.settings.get(key) {
            None => Ok(default.to_string()),
            Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "module '{}': setting '{}' must be a string",
                    self.name, key
                ))
            }),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub logging: LoggingConfig,
    pub defaults: ControllerConfig,
    pub scheduler: SchedulerConfig,
    pub watchdog: WatchdogConfig,
    pub modules: Vec<ModuleConfig>,
}

/// `<config dir>/Moduleflow/moduleflow.toml`, when a config dir exists
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Moduleflow").join("moduleflow.toml"))
}

impl RuntimeConfig {
    /// Load configuration from `path`, or from the default location
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default configuration.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        log::debug!("Loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        Self::from_toml_str(&contents).map_err(|error| match error {
            ConfigError::Parse { message, .. } => ConfigError::Parse { path, message },
            other => other,
        })
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|error| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.thread_count == 0 {
            return Err(ConfigError::invalid("defaults.thread_count must be at least 1"));
        }

        let mut names = HashSet::new();
        if self.scheduler.enabled {
            names.insert(self.scheduler.name.as_str());
        }
        if self.watchdog.enabled {
            if self.watchdog.interval_ms == 0 {
                return Err(ConfigError::invalid("watchdog.interval_ms must be at least 1"));
            }
            if !names.insert(self.watchdog.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "watchdog name '{}' clashes with the scheduler",
                    self.watchdog.name
                )));
            }
        }

        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(ConfigError::invalid("module names must not be empty"));
            }
            if !names.insert(module.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "module name '{}' is used more than once",
                    module.name
                )));
            }
            if module.threads == Some(0) {
                return Err(ConfigError::invalid(format!(
                    "module '{}': threads must be at least 1",
                    module.name
                )));
            }
            if module.retry.is_some() && !self.scheduler.enabled {
                return Err(ConfigError::invalid(format!(
                    "module '{}' uses retry but the scheduler is disabled",
                    module.name
                )));
            }
            if module.timer.as_ref().is_some_and(|timer| timer.interval_ms == 0) {
                return Err(ConfigError::invalid(format!(
                    "module '{}': timer.interval_ms must be at least 1",
                    module.name
                )));
            }
        }

        if let Some(unknown) = self
            .watchdog
            .supervise
            .iter()
            .find(|name| !self.modules.iter().any(|module| &module.name == *name))
        {
            return Err(ConfigError::invalid(format!(
                "watchdog supervises unknown module '{}'",
                unknown
            )));
        }

        Ok(())
    }
}

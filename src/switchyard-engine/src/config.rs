//! Runtime configuration.
//!
//! [`EngineSettings`] is the serializable part (TOML file or environment);
//! [`RuntimeConfig`] adds the live collaborators (log sinks, service
//! provider) and is handed to the dispatcher once at build time.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancellation::DEFAULT_SHUTDOWN_TIMEOUT;
use crate::error::SettingsError;
use crate::help::VersionInfo;
use crate::log::{LogSink, StderrSink, StdoutSink};
use crate::services::{ServiceCollection, ServiceProvider};

/// Environment variable overriding the shutdown grace period in milliseconds.
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "SWITCHYARD_SHUTDOWN_TIMEOUT_MS";

/// Environment variable overriding the informational version.
pub const ENV_VERSION: &str = "SWITCHYARD_VERSION";

/// Serializable engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Grace period between the first interrupt and forced termination.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Version reported by `--version`.
    #[serde(default)]
    pub informational_version: Option<String>,
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            informational_version: None,
        }
    }
}

impl EngineSettings {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::default().merge_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn merge_env(mut self) -> Result<Self, SettingsError> {
        if let Ok(raw) = std::env::var(ENV_SHUTDOWN_TIMEOUT_MS) {
            self.shutdown_timeout_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| SettingsError::InvalidEnv {
                        var: ENV_SHUTDOWN_TIMEOUT_MS.to_string(),
                        value: raw.clone(),
                    })?;
        }

        if let Ok(version) = std::env::var(ENV_VERSION) {
            if !version.is_empty() {
                self.informational_version = Some(version);
            }
        }

        Ok(self)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Everything the dispatcher reads while running.
///
/// The default configuration writes normal output to stdout and error output
/// to stderr. Replacing the normal sink with [`with_log`](Self::with_log)
/// sends error output to that same sink too, unless
/// [`with_error_log`](Self::with_error_log) sets one.
#[derive(Clone)]
pub struct RuntimeConfig {
    log: Arc<dyn LogSink>,
    log_error: Option<Arc<dyn LogSink>>,
    services: Arc<dyn ServiceProvider>,
    shutdown_timeout: Duration,
    version: VersionInfo,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log: Arc::new(StdoutSink),
            log_error: Some(Arc::new(StderrSink)),
            services: Arc::new(ServiceCollection::new()),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            version: VersionInfo::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        let mut config = Self::default().with_shutdown_timeout(settings.shutdown_timeout());
        if let Some(version) = &settings.informational_version {
            config.version.informational = Some(version.clone());
        }
        config
    }

    /// Sink for normal output. Error output also goes here unless
    /// [`with_error_log`](Self::with_error_log) sets a separate sink.
    pub fn with_log(mut self, sink: impl LogSink + 'static) -> Self {
        self.log = Arc::new(sink);
        self.log_error = None;
        self
    }

    pub fn with_error_log(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_error = Some(Arc::new(sink));
        self
    }

    pub fn with_services(mut self, services: impl ServiceProvider + 'static) -> Self {
        self.services = Arc::new(services);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    /// Build version, kept alongside any informational version already set.
    pub fn with_build_version(mut self, version: impl Into<String>) -> Self {
        self.version.build = Some(version.into());
        self
    }

    pub fn log(&self) -> &dyn LogSink {
        self.log.as_ref()
    }

    pub fn log_error(&self) -> &dyn LogSink {
        self.log_error.as_deref().unwrap_or(self.log.as_ref())
    }

    /// Shared handles to the normal and error sinks, for invocation contexts.
    pub(crate) fn sinks(&self) -> (Arc<dyn LogSink>, Arc<dyn LogSink>) {
        let error = self.log_error.clone().unwrap_or_else(|| Arc::clone(&self.log));
        (Arc::clone(&self.log), error)
    }

    pub fn services(&self) -> &dyn ServiceProvider {
        self.services.as_ref()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("separate_error_log", &self.log_error.is_some())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

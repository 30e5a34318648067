//! Client settings and their layered loading.

mod env;
mod file;
mod loader;
mod source;

pub use env::EnvSource;
pub use file::FileSource;
pub use loader::SettingsLoader;
pub use source::SettingsSource;

use crate::error::{Result, WatchError};
use serde::Deserialize;
use std::time::Duration;

/// Tunables of the watch engine and its HTTP transport.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes. Durations are expressed in milliseconds.
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::settings::ClientSettings;
/// use std::time::Duration;
///
/// let settings = ClientSettings::default();
/// assert_eq!(settings.long_polling_timeout(), Duration::from_secs(30));
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Server address, e.g. `http://127.0.0.1:8848`.
    pub server_addr: String,
    /// Path the Open API is mounted under.
    pub context_path: String,
    /// Application name reported to the server.
    pub app_name: String,
    /// TCP connect timeout.
    pub connection_timeout_ms: u64,
    /// Read timeout for ordinary requests.
    pub read_timeout_ms: u64,
    /// How long the server may hold a long-poll open.
    pub long_polling_timeout_ms: u64,
    /// Upper bound on a single listener callback.
    pub event_processing_timeout_ms: u64,
    /// Number of event dispatch workers.
    pub dispatch_workers: usize,
    /// Pause between cycles while no key is watched.
    pub idle_poll_interval_ms: u64,
    /// First delay after a failed long-poll.
    pub retry_initial_backoff_ms: u64,
    /// Cap on the delay between failed long-polls.
    pub retry_max_backoff_ms: u64,
    /// Username for basic authentication.
    pub username: Option<String>,
    /// Password for basic authentication.
    pub password: Option<String>,
    /// Access token, preferred over basic authentication when set.
    pub access_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_addr: "http://127.0.0.1:8848".to_string(),
            context_path: "/nacos".to_string(),
            app_name: "nacos-config-watch".to_string(),
            connection_timeout_ms: 60_000,
            read_timeout_ms: 180_000,
            long_polling_timeout_ms: 30_000,
            event_processing_timeout_ms: 30_000,
            dispatch_workers: 4,
            idle_poll_interval_ms: 1_000,
            retry_initial_backoff_ms: 2_000,
            retry_max_backoff_ms: 60_000,
            username: None,
            password: None,
            access_token: None,
        }
    }
}

impl ClientSettings {
    /// Create a loader that merges files and environment overrides.
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }

    /// TCP connect timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Read timeout for ordinary requests.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// How long the server may hold a long-poll open.
    pub fn long_polling_timeout(&self) -> Duration {
        Duration::from_millis(self.long_polling_timeout_ms)
    }

    /// Upper bound on a single listener callback.
    pub fn event_processing_timeout(&self) -> Duration {
        Duration::from_millis(self.event_processing_timeout_ms)
    }

    /// Pause between cycles while no key is watched.
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// First delay after a failed long-poll.
    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    /// Cap on the delay between failed long-polls.
    pub fn retry_max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_backoff_ms)
    }

    /// Check the settings for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Settings`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("connection_timeout_ms", self.connection_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("long_polling_timeout_ms", self.long_polling_timeout_ms),
            ("event_processing_timeout_ms", self.event_processing_timeout_ms),
            ("idle_poll_interval_ms", self.idle_poll_interval_ms),
            ("retry_initial_backoff_ms", self.retry_initial_backoff_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(WatchError::Settings(format!("{} must be greater than 0", name)));
            }
        }
        if self.dispatch_workers == 0 {
            return Err(WatchError::Settings(
                "dispatch_workers must be greater than 0".to_string(),
            ));
        }
        if self.retry_max_backoff_ms < self.retry_initial_backoff_ms {
            return Err(WatchError::Settings(format!(
                "retry_max_backoff_ms ({}) must not be less than retry_initial_backoff_ms ({})",
                self.retry_max_backoff_ms, self.retry_initial_backoff_ms
            )));
        }
        if self.server_addr.trim().is_empty() {
            return Err(WatchError::Settings("server_addr must not be empty".to_string()));
        }
        Ok(())
    }
}

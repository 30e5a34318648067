//! Environment variable settings source.

use super::SettingsSource;
use crate::error::{Result, WatchError};
use config::Environment;
use std::collections::HashMap;

/// Settings read from environment variables with a common prefix.
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::settings::EnvSource;
///
/// // NACOS_CLIENT_LONG_POLLING_TIMEOUT_MS=10000 -> long_polling_timeout_ms = 10000
/// let source = EnvSource::new("NACOS_CLIENT", "__");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
    vars: Option<HashMap<String, String>>,
}

impl EnvSource {
    /// Create a new environment variable source.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "NACOS_CLIENT")
    /// * `separator` - Separator for nested keys (e.g., "__")
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
            vars: None,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Read from `vars` instead of the process environment.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }
}

impl SettingsSource for EnvSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let environment = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true)
            .source(self.vars.as_ref().map(|vars| vars.clone().into_iter().collect()));

        config::Config::builder()
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize::<HashMap<String, config::Value>>())
            .map_err(|e| {
                WatchError::Settings(format!("Failed to read environment variables: {}", e))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

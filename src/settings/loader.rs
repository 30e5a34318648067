//! Layered loading of client settings.

use super::{ClientSettings, EnvSource, FileSource, SettingsSource};
use crate::error::{Result, WatchError};
use std::path::PathBuf;

/// Loads [`ClientSettings`] by merging layered sources.
///
/// Sources are merged in priority order (lowest first), so higher priority
/// sources override keys from lower ones. Keys no source provides keep their
/// defaults, and the merged result is validated.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::settings::ClientSettings;
///
/// # fn example() -> nacos_config_watch::error::Result<()> {
/// let settings = ClientSettings::loader()
///     .with_file("config/nacos-client.yaml")
///     .with_env_overrides("NACOS_CLIENT", "__")
///     .load()?;
/// # Ok(())
/// # }
/// ```
pub struct SettingsLoader {
    file_paths: Vec<PathBuf>,
    sources: Vec<Box<dyn SettingsSource>>,
}

impl SettingsLoader {
    /// Create a loader with no sources.
    pub fn new() -> Self {
        Self {
            file_paths: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Add a settings file. Later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Add environment variable overrides, which take precedence over files.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.sources.push(Box::new(EnvSource::new(prefix, separator)));
        self
    }

    /// Add a custom settings source.
    pub fn with_source<S: SettingsSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Load, merge and validate the settings.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Settings`] if any source fails to load, the
    /// merged values do not deserialize, or validation fails.
    pub fn load(self) -> Result<ClientSettings> {
        let mut sources: Vec<Box<dyn SettingsSource>> = self
            .file_paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                Box::new(FileSource::new(path).with_priority(100 + index as i32 * 10))
                    as Box<dyn SettingsSource>
            })
            .collect();
        sources.extend(self.sources);
        sources.sort_by_key(|s| s.priority());

        let mut builder = config::Config::builder();
        for source in &sources {
            let values = source.load()?;
            for (key, value) in values {
                builder = builder.set_override(&key, value).map_err(|e| {
                    WatchError::Settings(format!("Failed to merge source '{}': {}", source.name(), e))
                })?;
            }
            tracing::debug!(source = %source.name(), "merged settings source");
        }

        let settings: ClientSettings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| WatchError::Settings(format!("Failed to deserialize settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Names of the configured sources in priority order.
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<(i32, String)> = self
            .file_paths
            .iter()
            .enumerate()
            .map(|(index, path)| (100 + index as i32 * 10, format!("file:{}", path.display())))
            .chain(self.sources.iter().map(|s| (s.priority(), s.name())))
            .collect();
        names.sort_by_key(|(priority, _)| *priority);
        names.into_iter().map(|(_, name)| name).collect()
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

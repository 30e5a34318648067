//! File-based settings source.

use super::SettingsSource;
use crate::error::{Result, WatchError};
use config::{File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings read from a YAML, TOML or JSON file, chosen by extension.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::settings::FileSource;
///
/// let base = FileSource::new("nacos-client.yaml");
/// let local = FileSource::new("nacos-client.local.toml").optional();
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
    required: bool,
}

impl FileSource {
    /// Create a source for a file that must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
            required: true,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat a missing file as an empty layer.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

fn file_format(path: &Path) -> Result<FileFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(WatchError::Settings(format!(
            "cannot tell the format of {} (expected .yaml, .yml, .toml or .json)",
            path.display()
        ))),
    }
}

impl SettingsSource for FileSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let format = file_format(&self.path)?;

        config::Config::builder()
            .add_source(
                File::from(self.path.as_path())
                    .format(format)
                    .required(self.required),
            )
            .build()
            .and_then(|c| c.try_deserialize::<HashMap<String, config::Value>>())
            .map_err(|e| {
                WatchError::Settings(format!("failed to read {}: {}", self.path.display(), e))
            })
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

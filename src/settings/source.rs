//! Settings source trait.

use crate::error::Result;
use std::collections::HashMap;

/// A layer of client settings (a file, the environment, ...).
///
/// Layers are merged by [`SettingsLoader`](super::SettingsLoader) in priority
/// order; keys from higher priority layers override lower ones.
pub trait SettingsSource: Send + Sync {
    /// Load this layer as a flat key-value map.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be read or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Human-readable name for this layer (for logging/debugging).
    fn name(&self) -> String;

    /// Priority of this layer (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Files: 100, 110, 120, ... in the order they were added
    fn priority(&self) -> i32 {
        100
    }
}

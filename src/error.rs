//! Error types for nacos-config-watch.

/// Result type alias for nacos-config-watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Boxed error returned by listener callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by [`ConfigChangeListener::on_change`](crate::notify::ConfigChangeListener::on_change).
pub type ListenerResult = std::result::Result<(), BoxError>;

/// Errors that can occur while watching configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    /// A key component is empty or contains a reserved wire delimiter.
    #[error("Invalid listen key: {0}")]
    InvalidKey(String),

    /// The initial content fetch for a new registration failed.
    #[error("Failed to register listener for {key}: {reason}")]
    Registration {
        /// The key that could not be registered
        key: String,
        /// Why the baseline fetch failed
        reason: String,
    },

    /// The configuration does not exist on the server.
    #[error("Configuration not found: {0}")]
    NotFound(String),

    /// A network or HTTP level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server held the long-poll for the full timeout without reporting a change.
    #[error("Long-poll timed out after {0} ms")]
    Timeout(u64),

    /// The long-poll response could not be decoded.
    #[error("Malformed long-poll response: {0}")]
    Protocol(String),

    /// A listener callback failed, panicked or exceeded the event-processing timeout.
    #[error("Listener failed while handling change of {key}: {reason}")]
    ListenerFault {
        /// The key whose change event was being delivered
        key: String,
        /// Description of the fault
        reason: String,
    },

    /// Client settings could not be loaded or are invalid.
    #[error("Invalid client settings: {0}")]
    Settings(String),

    /// The watch has been stopped and cannot be restarted.
    #[error("Config watch has been stopped")]
    Stopped,

    /// Generic error for other cases.
    #[error("Config watch error: {0}")]
    Other(String),
}

impl WatchError {
    /// Returns `true` if this error is a long-poll timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` if the server reported the configuration as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn registration(key: impl ToString, cause: &WatchError) -> Self {
        Self::Registration {
            key: key.to_string(),
            reason: cause.to_string(),
        }
    }
}

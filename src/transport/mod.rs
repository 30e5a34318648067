//! Network collaborator used by the watch engine.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpAuth, NacosHttpTransport, NacosHttpTransportBuilder, PublishOptions};

use crate::core::ListenKey;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Reads configuration content and issues long-poll requests.
///
/// Implement this trait to plug the watch engine into a different transport
/// (or an in-memory server in tests).
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Fetch the current content of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`](crate::error::WatchError::NotFound)
    /// if the configuration does not exist, or
    /// [`WatchError::Transport`](crate::error::WatchError::Transport) on
    /// network failure.
    async fn fetch_content(&self, key: &ListenKey) -> Result<String>;

    /// Issue one long-poll carrying the encoded listening configs.
    ///
    /// The server holds the request for up to `timeout` and answers earlier
    /// when a listed key changed. Implementations must use a local read
    /// deadline strictly greater than `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Timeout`](crate::error::WatchError::Timeout) if
    /// nothing was reported before the deadline, or
    /// [`WatchError::Transport`](crate::error::WatchError::Transport) on
    /// network failure.
    async fn long_poll(&self, listening_configs: &str, timeout: Duration) -> Result<String>;
}

/// Local read deadline for a long-poll held up to `timeout` by the server.
pub fn long_poll_read_timeout(timeout: Duration) -> Duration {
    timeout + timeout / 2
}

//! Change detection over the long-poll protocol.

pub mod codec;

use crate::core::{ListenKey, RegistrySnapshot};
use crate::error::Result;
use crate::transport::ConfigTransport;
use std::sync::Arc;
use std::time::Duration;

/// Turns a registry snapshot into one long-poll and its answer into changed keys.
pub struct ChangeDetector {
    transport: Arc<dyn ConfigTransport>,
    long_polling_timeout: Duration,
}

impl ChangeDetector {
    /// Create a detector issuing long-polls held up to `long_polling_timeout`.
    pub fn new(transport: Arc<dyn ConfigTransport>, long_polling_timeout: Duration) -> Self {
        Self {
            transport,
            long_polling_timeout,
        }
    }

    /// The hold time requested from the server.
    pub fn long_polling_timeout(&self) -> Duration {
        self.long_polling_timeout
    }

    /// Run one long-poll for `snapshot` and return the keys the server reports as changed.
    ///
    /// A long-poll that times out means nothing changed. Keys the server
    /// reports that are not in `snapshot` are dropped, and keys it does not
    /// mention are unchanged. An empty snapshot never reaches the network.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Transport`](crate::error::WatchError::Transport)
    /// if the request failed and
    /// [`WatchError::Protocol`](crate::error::WatchError::Protocol) if the
    /// answer could not be decoded.
    pub async fn detect(&self, snapshot: &RegistrySnapshot) -> Result<Vec<ListenKey>> {
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let listening_configs = codec::encode(snapshot.iter());
        let raw = match self
            .transport
            .long_poll(&listening_configs, self.long_polling_timeout)
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut changed = codec::decode(&raw)?;
        changed.retain(|key| {
            let watched = snapshot.contains(key);
            if !watched {
                tracing::debug!(%key, "ignoring change report for unwatched key");
            }
            watched
        });
        Ok(changed)
    }
}

//! Listener capability and the change event it receives.

use crate::core::{Fingerprint, ListenKey};
use crate::error::ListenerResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A change detected for a watched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    /// The key whose content changed.
    pub key: ListenKey,
    /// Fingerprint held before the change.
    pub old_fingerprint: Fingerprint,
    /// Fingerprint of `content`.
    pub new_fingerprint: Fingerprint,
    /// The new content.
    pub content: String,
}

/// Receives change events for the keys it is registered on.
///
/// Listeners are identified by their `Arc` allocation: registering the same
/// `Arc` twice for a key has no effect, and removal needs the same `Arc`.
///
/// Returning an error, panicking, or running past the event-processing
/// timeout is reported as a listener fault and never affects other listeners.
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::error::ListenerResult;
/// use nacos_config_watch::notify::{ConfigChangeEvent, ConfigChangeListener};
///
/// struct PrintListener;
///
/// #[async_trait::async_trait]
/// impl ConfigChangeListener for PrintListener {
///     async fn on_change(&self, event: &ConfigChangeEvent) -> ListenerResult {
///         println!("{} changed: {}", event.key, event.content);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ConfigChangeListener: Send + Sync {
    /// Handle a change of a watched configuration.
    async fn on_change(&self, event: &ConfigChangeEvent) -> ListenerResult;
}

/// Shared handle to a registered listener.
pub type ListenerRef = Arc<dyn ConfigChangeListener>;

/// Adapts a synchronous closure into a [`ConfigChangeListener`].
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::notify::FnListener;
///
/// let listener = FnListener::new(|event| {
///     println!("{} -> {}", event.key, event.content);
/// });
/// ```
pub struct FnListener<F> {
    callback: F,
}

impl<F> FnListener<F>
where
    F: Fn(&ConfigChangeEvent) + Send + Sync + 'static,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }

    /// Wrap `callback` directly into a [`ListenerRef`].
    pub fn shared(callback: F) -> ListenerRef {
        Arc::new(Self::new(callback))
    }
}

#[async_trait]
impl<F> ConfigChangeListener for FnListener<F>
where
    F: Fn(&ConfigChangeEvent) + Send + Sync + 'static,
{
    async fn on_change(&self, event: &ConfigChangeEvent) -> ListenerResult {
        (self.callback)(event);
        Ok(())
    }
}

//! The client-facing watch handle.

use crate::core::{ConfigWatchBuilder, ListenKey, ListenerRegistry};
use crate::error::{Result, WatchError};
use crate::notify::{Backoff, EventDispatcher, ListenerRef, PollLoop, Reporter, in_dispatch};
use crate::settings::ClientSettings;
use crate::transport::ConfigTransport;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

enum Lifecycle {
    Created,
    Running {
        poller: JoinHandle<()>,
        dispatcher: Arc<EventDispatcher>,
    },
    Stopped,
}

struct WatchInner {
    registry: Arc<ListenerRegistry>,
    transport: Arc<dyn ConfigTransport>,
    settings: ClientSettings,
    reporter: Reporter,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl Drop for WatchInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Lifecycle::Running { dispatcher, .. } = &*self.lifecycle.get_mut() {
            dispatcher.close();
        }
    }
}

/// Watches configurations on a Nacos server and notifies listeners of changes.
///
/// Owns the listener registry, the background poll loop and the event
/// dispatcher. Cloning is cheap and yields a handle to the same watch.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let watch = ConfigWatch::builder()
///     .with_settings(ClientSettings::default())
///     .build()?;
///
/// let listener = FnListener::shared(|event| {
///     println!("{} is now:\n{}", event.key, event.content);
/// });
/// watch
///     .add_event_listener("", "DEFAULT_GROUP", "app.properties", listener)
///     .await?;
///
/// watch.start()?;
/// // ...
/// watch.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigWatch {
    inner: Arc<WatchInner>,
}

impl ConfigWatch {
    /// Create a builder.
    pub fn builder() -> ConfigWatchBuilder {
        ConfigWatchBuilder::new()
    }

    pub(crate) fn new(
        settings: ClientSettings,
        transport: Arc<dyn ConfigTransport>,
        reporter: Reporter,
    ) -> Self {
        Self {
            inner: Arc::new(WatchInner {
                registry: Arc::new(ListenerRegistry::new()),
                transport,
                settings,
                reporter,
                cancel: CancellationToken::new(),
                lifecycle: Mutex::new(Lifecycle::Created),
            }),
        }
    }

    /// Register `listener` for the configuration `data_id` in `group` of `namespace_id`.
    ///
    /// Empty `namespace_id` and `group` select the defaults. The first
    /// listener of a key fetches its current content so that only later
    /// changes are reported. Registering the same listener twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Registration`] if the key is invalid or its
    /// content could not be fetched, and [`WatchError::Stopped`] after
    /// [`stop`](Self::stop).
    pub async fn add_event_listener(
        &self,
        namespace_id: &str,
        group: &str,
        data_id: &str,
        listener: ListenerRef,
    ) -> Result<()> {
        let key = ListenKey::new(namespace_id, group, data_id).map_err(|e| {
            WatchError::registration(format!("{}/{}/{}", namespace_id, group, data_id), &e)
        })?;
        self.add_listener(&key, listener).await.map(|_| ())
    }

    /// Register `listener` for `key`. Returns `true` if it was newly registered.
    pub async fn add_listener(&self, key: &ListenKey, listener: ListenerRef) -> Result<bool> {
        if self.is_stopped() {
            return Err(WatchError::Stopped);
        }

        let added = self
            .inner
            .registry
            .add(key, Arc::clone(&listener), self.inner.transport.as_ref())
            .await?;

        // `stop` may have released the registry while the seed fetch was pending.
        if self.is_stopped() {
            if added {
                self.inner.registry.remove(key, &listener);
            }
            return Err(WatchError::Stopped);
        }

        if added {
            tracing::debug!(%key, "listener registered");
        }
        Ok(added)
    }

    /// Remove `listener` from the configuration `data_id` in `group` of `namespace_id`.
    ///
    /// The key stops being polled once its last listener is gone. Removing a
    /// listener that is not registered is a no-op and returns `false`.
    pub fn remove_event_listener(
        &self,
        namespace_id: &str,
        group: &str,
        data_id: &str,
        listener: &ListenerRef,
    ) -> bool {
        match ListenKey::new(namespace_id, group, data_id) {
            Ok(key) => self.remove_listener(&key, listener),
            Err(_) => false,
        }
    }

    /// Remove `listener` from `key`.
    pub fn remove_listener(&self, key: &ListenKey, listener: &ListenerRef) -> bool {
        let removed = self.inner.registry.remove(key, listener);
        if removed {
            tracing::debug!(%key, "listener removed");
        }
        removed
    }

    /// Fetch the current content of a configuration without watching it.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidKey`] for an invalid key,
    /// [`WatchError::NotFound`] if the configuration does not exist, or the
    /// transport's error.
    pub async fn get_config(&self, namespace_id: &str, group: &str, data_id: &str) -> Result<String> {
        let key = ListenKey::new(namespace_id, group, data_id)?;
        self.inner.transport.fetch_content(&key).await
    }

    /// Start the poll loop and the event dispatcher.
    ///
    /// Calling `start` on a running watch does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] after [`stop`](Self::stop), and
    /// [`WatchError::Other`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped => return Err(WatchError::Stopped),
            Lifecycle::Created => {}
        }

        tokio::runtime::Handle::try_current()
            .map_err(|_| WatchError::Other("config watch must be started inside a tokio runtime".to_string()))?;

        let inner = &self.inner;
        let settings = &inner.settings;
        let dispatcher = Arc::new(EventDispatcher::spawn(
            settings.dispatch_workers,
            Arc::clone(&inner.registry),
            settings.event_processing_timeout(),
            inner.reporter.clone(),
        ));
        let poller = PollLoop::new(
            Arc::clone(&inner.registry),
            Arc::clone(&inner.transport),
            settings.long_polling_timeout(),
            Arc::clone(&dispatcher),
            inner.cancel.child_token(),
            Backoff::new(settings.retry_initial_backoff(), settings.retry_max_backoff()),
            settings.idle_poll_interval(),
            inner.reporter.clone(),
        )
        .spawn();

        tracing::info!(
            workers = settings.dispatch_workers,
            keys = inner.registry.len(),
            "config watch started"
        );
        *lifecycle = Lifecycle::Running { poller, dispatcher };
        Ok(())
    }

    /// Stop watching.
    ///
    /// Cancels the in-flight long-poll, lets the dispatcher deliver events
    /// already queued and then releases every registration. Further calls do
    /// nothing.
    ///
    /// Called from inside a listener callback, `stop` returns right after
    /// cancelling and the drain finishes in the background.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.inner.lifecycle.lock(), Lifecycle::Stopped);
        self.inner.cancel.cancel();

        let (poller, dispatcher) = match previous {
            Lifecycle::Running { poller, dispatcher } => (poller, dispatcher),
            Lifecycle::Created => {
                self.inner.registry.clear();
                tracing::info!("config watch stopped");
                return;
            }
            Lifecycle::Stopped => return,
        };

        let registry = Arc::clone(&self.inner.registry);
        let drain = async move {
            if let Err(e) = poller.await {
                if e.is_panic() {
                    tracing::error!("config poll loop panicked");
                }
            }
            for worker in dispatcher.close() {
                let _ = worker.await;
            }
            registry.clear();
            tracing::info!("config watch stopped");
        };

        if in_dispatch() {
            tracing::debug!("stop requested from a listener, draining in the background");
            tokio::spawn(drain);
        } else {
            drain.await;
        }
    }

    /// Whether the poll loop is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Running { .. })
    }

    fn is_stopped(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Stopped)
    }

    /// Keys currently watched, in key order.
    pub fn listened_keys(&self) -> Vec<ListenKey> {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The settings this watch was built with.
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }
}

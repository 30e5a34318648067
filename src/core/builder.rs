//! Builder for constructing ConfigWatch instances.

use crate::core::ConfigWatch;
use crate::error::{Result, WatchError};
use crate::notify::{ErrorHook, Reporter};
use crate::settings::ClientSettings;
use crate::transport::ConfigTransport;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Builder for constructing a [`ConfigWatch`].
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let settings = ClientSettings::loader()
///     .with_file("config/nacos.yaml")
///     .with_env_overrides("NACOS", "__")
///     .load()?;
///
/// let watch = ConfigWatch::builder()
///     .with_settings(settings)
///     .with_long_polling_timeout(Duration::from_secs(10))
///     .on_error(|e| eprintln!("config watch: {}", e))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatchBuilder {
    settings: ClientSettings,
    transport: Option<Arc<dyn ConfigTransport>>,
    error_hook: Option<ErrorHook>,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl ConfigWatchBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: ClientSettings::default(),
            transport: None,
            error_hook: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Use `settings`, replacing anything set before.
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Talk to the server through `transport` instead of the HTTP transport
    /// built from the settings.
    pub fn with_transport(mut self, transport: Arc<dyn ConfigTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Call `hook` with every recoverable fault of the background engine:
    /// failed long-polls and fetches, malformed responses, listener faults.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// How long the server may hold a long-poll.
    pub fn with_long_polling_timeout(mut self, timeout: Duration) -> Self {
        self.settings.long_polling_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Number of dispatch workers.
    pub fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.settings.dispatch_workers = workers;
        self
    }

    /// Deadline for a single listener callback.
    pub fn with_event_processing_timeout(mut self, timeout: Duration) -> Self {
        self.settings.event_processing_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Record metrics through `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(WatchMetrics::new(meter));
        self
    }

    /// Build the watch. Nothing is polled until [`ConfigWatch::start`].
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Settings`] if the settings are invalid or no
    /// transport is available.
    pub fn build(self) -> Result<ConfigWatch> {
        self.settings.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.settings)?,
        };

        #[allow(unused_mut)]
        let mut reporter = Reporter::new(self.error_hook);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = self.metrics {
            reporter = reporter.with_metrics(metrics);
        }

        Ok(ConfigWatch::new(self.settings, transport, reporter))
    }
}

impl Default for ConfigWatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
fn default_transport(settings: &ClientSettings) -> Result<Arc<dyn ConfigTransport>> {
    let transport = crate::transport::NacosHttpTransport::from_settings(settings)?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(_settings: &ClientSettings) -> Result<Arc<dyn ConfigTransport>> {
    Err(WatchError::Settings(
        "no transport configured and the `http` feature is disabled".to_string(),
    ))
}

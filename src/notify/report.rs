//! Where recoverable faults of the background engine end up.

use crate::error::WatchError;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Callback receiving every recoverable fault of the background engine.
pub type ErrorHook = Arc<dyn Fn(&WatchError) + Send + Sync>;

/// Logs faults, forwards them to the error hook and feeds metrics.
#[derive(Clone, Default)]
pub(crate) struct Reporter {
    hook: Option<ErrorHook>,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl Reporter {
    pub(crate) fn new(hook: Option<ErrorHook>) -> Self {
        Self {
            hook,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: WatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn report(&self, error: &WatchError) {
        match error {
            WatchError::ListenerFault { .. } => {
                tracing::warn!(error = %error, "listener fault");
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_listener_fault();
                }
            }
            WatchError::Protocol(_) => tracing::warn!(error = %error, "discarding long-poll response"),
            _ => tracing::warn!(error = %error, "config watch fault"),
        }
        if let Some(hook) = &self.hook {
            hook(error);
        }
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    pub(crate) fn cycle_completed(&self, changed: usize, watched: usize) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(changed, watched);
        }
    }

    pub(crate) fn poll_failed(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_poll_failure();
        }
    }

    pub(crate) fn event_dispatched(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_event_dispatched();
        }
    }
}

//! Background long-poll loop.

use super::report::Reporter;
use super::{ConfigChangeEvent, EventDispatcher};
use crate::core::{Fingerprint, ListenKey, ListenerRegistry};
use crate::error::WatchError;
use crate::protocol::ChangeDetector;
use crate::transport::ConfigTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing is watched; no request was issued.
    Idle,
    /// The server reported no change (or held the request until timeout).
    Unchanged,
    /// The server reported changes.
    Changed {
        /// Keys reported as changed.
        detected: usize,
        /// Events handed to the dispatcher.
        dispatched: usize,
        /// Keys whose content could not be fetched and will be retried.
        failed: usize,
    },
    /// The response could not be decoded and was discarded.
    Malformed,
    /// The long-poll failed.
    Failed,
    /// Shutdown was requested.
    Cancelled,
}

/// Exponential backoff between failed cycles.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    /// Create a backoff starting at `initial`, doubling up to `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(current) => current.saturating_mul(2).min(self.max),
        };
        self.current = Some(next);
        next
    }

    /// Forget previous failures.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Repeatedly long-polls for changes of the watched keys and dispatches events.
///
/// The loop only ends through its [`CancellationToken`]; every network call
/// and sleep is raced against it so shutdown does not wait for a long-poll to
/// come back.
pub struct PollLoop {
    registry: Arc<ListenerRegistry>,
    transport: Arc<dyn ConfigTransport>,
    detector: ChangeDetector,
    dispatcher: Arc<EventDispatcher>,
    cancel: CancellationToken,
    backoff: Backoff,
    idle_interval: Duration,
    reporter: Reporter,
}

impl PollLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: Arc<ListenerRegistry>,
        transport: Arc<dyn ConfigTransport>,
        long_polling_timeout: Duration,
        dispatcher: Arc<EventDispatcher>,
        cancel: CancellationToken,
        backoff: Backoff,
        idle_interval: Duration,
        reporter: Reporter,
    ) -> Self {
        Self {
            detector: ChangeDetector::new(Arc::clone(&transport), long_polling_timeout),
            registry,
            transport,
            dispatcher,
            cancel,
            backoff,
            idle_interval,
            reporter,
        }
    }

    /// Run the loop on the current tokio runtime.
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run cycles until cancelled.
    pub async fn run(mut self) {
        tracing::info!(
            long_polling_timeout_ms = self.detector.long_polling_timeout().as_millis() as u64,
            "config poll loop started"
        );

        loop {
            let outcome = self.poll_once().await;
            if outcome == CycleOutcome::Cancelled {
                break;
            }

            if let Some(pause) = self.pause_after(&outcome) {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        tracing::info!("config poll loop stopped");
    }

    /// Run a single cycle: snapshot, long-poll, fetch changed content, dispatch.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return CycleOutcome::Idle;
        }

        tracing::debug!(keys = snapshot.len(), "long-polling for changes");
        let detected = tokio::select! {
            _ = self.cancel.cancelled() => return CycleOutcome::Cancelled,
            detected = self.detector.detect(&snapshot) => detected,
        };

        match detected {
            Ok(changed) if changed.is_empty() => {
                self.reporter.cycle_completed(0, snapshot.len());
                CycleOutcome::Unchanged
            }
            Ok(changed) => {
                self.reporter.cycle_completed(changed.len(), snapshot.len());
                self.handle_changes(changed).await
            }
            Err(e @ WatchError::Protocol(_)) => {
                self.reporter.report(&e);
                CycleOutcome::Malformed
            }
            Err(e) => {
                self.reporter.poll_failed();
                self.reporter.report(&e);
                CycleOutcome::Failed
            }
        }
    }

    async fn handle_changes(&mut self, changed: Vec<ListenKey>) -> CycleOutcome {
        let detected = changed.len();
        let mut dispatched = 0;
        let mut failed = 0;

        for key in changed {
            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => return CycleOutcome::Cancelled,
                fetched = self.transport.fetch_content(&key) => fetched,
            };

            match fetched {
                Ok(content) => {
                    if self.apply(key, content) {
                        dispatched += 1;
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::info!(%key, "watched config no longer exists");
                    self.registry.update_fingerprint(&key, Fingerprint::absent());
                }
                Err(e) => {
                    failed += 1;
                    self.reporter.report(&e);
                }
            }
        }

        CycleOutcome::Changed {
            detected,
            dispatched,
            failed,
        }
    }

    /// Record the fetched content and dispatch an event if its fingerprint moved.
    fn apply(&self, key: ListenKey, content: String) -> bool {
        let new_fingerprint = Fingerprint::of(&content);
        match self.registry.fingerprint(&key) {
            None => return false,
            Some(current) if current == new_fingerprint => {
                tracing::debug!(%key, "reported change has the known fingerprint");
                return false;
            }
            Some(_) => {}
        }

        let Some(old_fingerprint) = self.registry.update_fingerprint(&key, new_fingerprint.clone())
        else {
            return false;
        };

        tracing::info!(
            %key,
            old = %old_fingerprint,
            new = %new_fingerprint,
            "config changed"
        );
        self.dispatcher.submit(ConfigChangeEvent {
            key,
            old_fingerprint,
            new_fingerprint,
            content,
        })
    }

    fn pause_after(&mut self, outcome: &CycleOutcome) -> Option<Duration> {
        match outcome {
            CycleOutcome::Idle | CycleOutcome::Malformed => Some(self.idle_interval),
            CycleOutcome::Unchanged | CycleOutcome::Changed { failed: 0, .. } => {
                self.backoff.reset();
                None
            }
            CycleOutcome::Changed { .. } | CycleOutcome::Failed => {
                let delay = self.backoff.next_delay();
                tracing::warn!(retry_in_ms = delay.as_millis() as u64, "backing off before next poll");
                Some(delay)
            }
            CycleOutcome::Cancelled => None,
        }
    }
}

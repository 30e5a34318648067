//! Delivery of change events to listeners on a bounded pool of workers.

use super::report::Reporter;
use super::{ConfigChangeEvent, ListenerRef};
use crate::core::{ListenKey, ListenerRegistry};
use crate::error::WatchError;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

tokio::task_local! {
    static IN_DISPATCH: ();
}

/// Whether the current task is running a listener callback.
pub(crate) fn in_dispatch() -> bool {
    IN_DISPATCH.try_with(|_| ()).is_ok()
}

/// Delivers [`ConfigChangeEvent`]s to the listeners registered for their key.
///
/// Events are routed by key to one of a fixed number of workers, so events
/// of one key are delivered in submission order while different keys proceed
/// in parallel. Queues are unbounded: submitting never blocks and never drops.
///
/// Listeners are looked up when the event is delivered, so a listener removed
/// before that point does not see it. Each callback runs in its own task
/// bounded by the event-processing timeout; an error, panic or timeout is
/// reported as [`WatchError::ListenerFault`] and delivery continues.
pub struct EventDispatcher {
    senders: Mutex<Option<Vec<mpsc::UnboundedSender<ConfigChangeEvent>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    reporter: Reporter,
}

impl EventDispatcher {
    /// Spawn `workers` dispatch workers on the current tokio runtime.
    pub(crate) fn spawn(
        workers: usize,
        registry: Arc<ListenerRegistry>,
        event_processing_timeout: Duration,
        reporter: Reporter,
    ) -> Self {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers.max(1) {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(
                id,
                rx,
                Arc::clone(&registry),
                event_processing_timeout,
                reporter.clone(),
            )));
        }

        Self {
            senders: Mutex::new(Some(senders)),
            workers: Mutex::new(handles),
            reporter,
        }
    }

    /// Queue `event` for delivery. Returns `false` once the dispatcher is closed.
    pub fn submit(&self, event: ConfigChangeEvent) -> bool {
        let senders = self.senders.lock();
        let Some(senders) = senders.as_ref() else {
            tracing::debug!(key = %event.key, "dispatcher closed, dropping change event");
            return false;
        };

        let worker = worker_for(&event.key, senders.len());
        match senders[worker].send(event) {
            Ok(()) => {
                self.reporter.event_dispatched();
                true
            }
            Err(_) => false,
        }
    }

    /// Stop accepting events and hand back the workers.
    ///
    /// Workers exit once they have delivered everything already queued;
    /// awaiting the returned handles waits for that drain.
    pub(crate) fn close(&self) -> Vec<JoinHandle<()>> {
        self.senders.lock().take();
        std::mem::take(&mut *self.workers.lock())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.senders.lock().is_none()
    }
}

fn worker_for(key: &ListenKey, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

async fn run_worker(
    id: usize,
    mut rx: mpsc::UnboundedReceiver<ConfigChangeEvent>,
    registry: Arc<ListenerRegistry>,
    event_processing_timeout: Duration,
    reporter: Reporter,
) {
    tracing::debug!(worker = id, "dispatch worker started");
    while let Some(event) = rx.recv().await {
        let listeners = registry.listeners(&event.key);
        tracing::debug!(
            worker = id,
            key = %event.key,
            listeners = listeners.len(),
            "delivering change event"
        );

        let event = Arc::new(event);
        for listener in listeners {
            deliver(listener, Arc::clone(&event), event_processing_timeout, &reporter).await;
        }
    }
    tracing::debug!(worker = id, "dispatch worker drained");
}

async fn deliver(
    listener: ListenerRef,
    event: Arc<ConfigChangeEvent>,
    event_processing_timeout: Duration,
    reporter: &Reporter,
) {
    let key = event.key.to_string();
    let mut task =
        tokio::spawn(IN_DISPATCH.scope((), async move { listener.on_change(&event).await }));

    let reason = match tokio::time::timeout(event_processing_timeout, &mut task).await {
        Ok(Ok(Ok(()))) => return,
        Ok(Ok(Err(e))) => e.to_string(),
        Ok(Err(join_error)) if join_error.is_panic() => "listener panicked".to_string(),
        Ok(Err(join_error)) => format!("listener task failed: {}", join_error),
        Err(_) => {
            task.abort();
            // Wait for the abort so the callback's captures are released.
            let _ = task.await;
            format!(
                "listener did not finish within {} ms",
                event_processing_timeout.as_millis()
            )
        }
    };

    reporter.report(&WatchError::ListenerFault { key, reason });
}

//! Watch engine metrics using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Metrics collector for the poll loop and event dispatch.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config_watch::metrics::WatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("nacos-config-watch");
/// let metrics = WatchMetrics::new(meter);
///
/// metrics.record_cycle(1, 3);
/// metrics.record_event_dispatched();
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    poll_cycles: Counter<u64>,
    poll_failures: Counter<u64>,
    changes_detected: Counter<u64>,
    events_dispatched: Counter<u64>,
    listener_faults: Counter<u64>,
    watched_keys: Gauge<i64>,
}

impl WatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let poll_cycles = meter
            .u64_counter("nacos_config_watch.poll.cycles")
            .with_description("Number of completed long-poll cycles")
            .build();

        let poll_failures = meter
            .u64_counter("nacos_config_watch.poll.failures")
            .with_description("Number of long-polls that failed")
            .build();

        let changes_detected = meter
            .u64_counter("nacos_config_watch.changes.detected")
            .with_description("Number of keys reported as changed")
            .build();

        let events_dispatched = meter
            .u64_counter("nacos_config_watch.events.dispatched")
            .with_description("Number of change events queued for listeners")
            .build();

        let listener_faults = meter
            .u64_counter("nacos_config_watch.listener.faults")
            .with_description("Number of listener callbacks that failed, panicked or timed out")
            .build();

        let watched_keys = meter
            .i64_gauge("nacos_config_watch.keys.watched")
            .with_description("Number of keys included in the last long-poll")
            .build();

        Self {
            poll_cycles,
            poll_failures,
            changes_detected,
            events_dispatched,
            listener_faults,
            watched_keys,
        }
    }

    /// Record a completed long-poll that reported `changed` of `watched` keys.
    pub fn record_cycle(&self, changed: usize, watched: usize) {
        self.poll_cycles.add(1, &[]);
        self.changes_detected.add(changed as u64, &[]);
        self.watched_keys.record(watched as i64, &[]);
    }

    /// Record a failed long-poll.
    pub fn record_poll_failure(&self) {
        self.poll_failures.add(1, &[]);
    }

    /// Record an event handed to the dispatcher.
    pub fn record_event_dispatched(&self) {
        self.events_dispatched.add(1, &[]);
    }

    /// Record a listener fault.
    pub fn record_listener_fault(&self) {
        self.listener_faults.add(1, &[]);
    }
}

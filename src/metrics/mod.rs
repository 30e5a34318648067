//! OpenTelemetry metrics for the watch engine.
//!
//! Tracks:
//! - Long-poll cycles and failures
//! - Changes detected and events dispatched
//! - Listener faults
//! - Number of watched keys
//!
//! # Examples
//!
//! ```rust,no_run
//! use nacos_config_watch::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let watch = ConfigWatch::builder()
//!     .with_settings(ClientSettings::default())
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;

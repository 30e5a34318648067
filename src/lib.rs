//! # nacos-config-watch
//!
//! Client-side change listening for a Nacos configuration server.
//!
//! ## Overview
//!
//! `nacos-config-watch` keeps a set of watched configurations, each identified
//! by namespace, group and data id, and tells registered listeners when their
//! content changes:
//! - A lock-free listener registry using `arc-swap`
//! - A background long-poll loop with exponential backoff and prompt cancellation
//! - An event dispatcher that isolates faulty listeners and keeps per-key order
//! - Layered client settings (files, then environment variables)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nacos_config_watch::prelude::*;
//!
//! # async fn example() -> nacos_config_watch::error::Result<()> {
//! let settings = ClientSettings::loader()
//!     .with_file("config/nacos.yaml")
//!     .with_env_overrides("NACOS", "__")
//!     .load()?;
//!
//! let watch = ConfigWatch::builder().with_settings(settings).build()?;
//!
//! watch
//!     .add_event_listener(
//!         "",
//!         "DEFAULT_GROUP",
//!         "app.properties",
//!         FnListener::shared(|event| println!("{} changed", event.key)),
//!     )
//!     .await?;
//!
//! watch.start()?;
//! # watch.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` (default): the Nacos v1 Open API transport built on `reqwest`
//! - `metrics`: OpenTelemetry metrics for the poll loop and dispatcher

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod settings;
pub mod transport;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigWatch, ConfigWatchBuilder, Fingerprint, ListenKey};
    pub use crate::error::{ListenerResult, Result, WatchError};
    pub use crate::notify::{ConfigChangeEvent, ConfigChangeListener, FnListener, ListenerRef};
    pub use crate::settings::ClientSettings;
    pub use crate::transport::ConfigTransport;

    #[cfg(feature = "http")]
    pub use crate::transport::NacosHttpTransport;
}

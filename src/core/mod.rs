//! Core types: keys, fingerprints, the listener registry and the watch handle.

mod builder;
mod fingerprint;
mod key;
mod registry;
mod watch;

pub use builder::ConfigWatchBuilder;
pub use fingerprint::Fingerprint;
pub use key::{DEFAULT_GROUP, DEFAULT_NAMESPACE_ID, FIELD_SEPARATOR, ListenKey, RECORD_SEPARATOR};
pub use registry::{ListenerRegistry, RegistrySnapshot};
pub use watch::ConfigWatch;

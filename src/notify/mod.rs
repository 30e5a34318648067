//! Change notification: the poll loop, the event dispatcher and the listener API.

mod dispatcher;
mod listener;
mod poller;
mod report;

pub use dispatcher::EventDispatcher;
pub(crate) use dispatcher::in_dispatch;
pub use listener::{ConfigChangeEvent, ConfigChangeListener, FnListener, ListenerRef};
pub use poller::{Backoff, CycleOutcome, PollLoop};
pub use report::ErrorHook;
pub(crate) use report::Reporter;

//! In-memory config server shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nacos_config_watch::prelude::*;
use nacos_config_watch::settings::ClientSettings;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// Holds configurations in memory and answers long-polls the way a Nacos
/// server does: immediately if a listed fingerprint is stale, otherwise once
/// something changes or the hold time runs out.
#[derive(Default)]
pub struct InMemoryServer {
    contents: Mutex<HashMap<ListenKey, String>>,
    changed: Notify,
    failing_fetches: AtomicUsize,
    failing_polls: AtomicUsize,
    polls: AtomicUsize,
    last_listening_configs: Mutex<String>,
}

impl InMemoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, data_id: &str, content: &str) {
        self.contents.lock().insert(key(data_id), content.to_string());
        self.changed.notify_waiters();
    }

    pub fn publish_in(&self, namespace_id: &str, group: &str, data_id: &str, content: &str) {
        let key = ListenKey::new(namespace_id, group, data_id).unwrap();
        self.contents.lock().insert(key, content.to_string());
        self.changed.notify_waiters();
    }

    pub fn delete(&self, data_id: &str) {
        self.contents.lock().remove(&key(data_id));
        self.changed.notify_waiters();
    }

    /// Make the next `n` content fetches fail.
    pub fn fail_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` long-polls fail.
    pub fn fail_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn last_listening_configs(&self) -> String {
        self.last_listening_configs.lock().clone()
    }

    fn stale_keys(&self, listening_configs: &str) -> Vec<ListenKey> {
        let contents = self.contents.lock();
        listening_configs
            .split('\u{1}')
            .filter(|record| !record.is_empty())
            .filter_map(|record| {
                let fields: Vec<&str> = record.split('\u{2}').collect();
                let (data_id, group, md5, namespace_id) = match fields.as_slice() {
                    [data_id, group, md5] => (*data_id, *group, *md5, ""),
                    [data_id, group, md5, namespace_id] => (*data_id, *group, *md5, *namespace_id),
                    _ => panic!("malformed listening config record {:?}", record),
                };
                let key = ListenKey::new(namespace_id, group, data_id).unwrap();
                let current = contents
                    .get(&key)
                    .map(|content| Fingerprint::of(content))
                    .unwrap_or_else(Fingerprint::absent);
                (current.as_str() != md5).then_some(key)
            })
            .collect()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn acknowledge(keys: &[ListenKey]) -> String {
    let mut raw = String::new();
    for key in keys {
        raw.push_str(key.data_id());
        raw.push('\u{2}');
        raw.push_str(key.group());
        if !key.is_default_namespace() {
            raw.push('\u{2}');
            raw.push_str(key.namespace_id());
        }
        raw.push('\u{1}');
    }
    urlencoding::encode(&raw).into_owned()
}

#[async_trait]
impl ConfigTransport for InMemoryServer {
    async fn fetch_content(&self, key: &ListenKey) -> Result<String> {
        if take_one(&self.failing_fetches) {
            return Err(WatchError::Transport("connection reset by peer".to_string()));
        }
        self.contents
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| WatchError::NotFound(key.to_string()))
    }

    async fn long_poll(&self, listening_configs: &str, timeout: Duration) -> Result<String> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        *self.last_listening_configs.lock() = listening_configs.to_string();
        if take_one(&self.failing_polls) {
            return Err(WatchError::Transport("connection refused".to_string()));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let stale = self.stale_keys(listening_configs);
            if !stale.is_empty() {
                return Ok(acknowledge(&stale));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(WatchError::Timeout(timeout.as_millis() as u64));
            }
        }
    }
}

pub fn key(data_id: &str) -> ListenKey {
    ListenKey::new("", "", data_id).unwrap()
}

/// Settings with short timeouts so cycles complete quickly.
pub fn fast_settings() -> ClientSettings {
    ClientSettings {
        long_polling_timeout_ms: 200,
        event_processing_timeout_ms: 1_000,
        idle_poll_interval_ms: 20,
        retry_initial_backoff_ms: 20,
        retry_max_backoff_ms: 100,
        dispatch_workers: 2,
        ..ClientSettings::default()
    }
}

/// A listener forwarding every event into a channel.
pub fn channel_listener() -> (ListenerRef, mpsc::UnboundedReceiver<ConfigChangeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = FnListener::shared(move |event| {
        let _ = tx.send(event.clone());
    });
    (listener, rx)
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConfigChangeEvent>) -> ConfigChangeEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no change event within 5s")
        .expect("listener channel closed")
}

pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<ConfigChangeEvent>, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected change event for {}", event.key);
    }
}

/// Collects every error reported to the error hook.
pub fn error_sink() -> (Arc<Mutex<Vec<WatchError>>>, impl Fn(&WatchError) + Send + Sync + 'static) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);
    (errors, move |e: &WatchError| errors_clone.lock().push(e.clone()))
}

//! Registry of watched keys, their listeners and last-seen fingerprints.

use crate::core::{Fingerprint, ListenKey};
use crate::error::{Result, WatchError};
use crate::notify::ListenerRef;
use crate::transport::ConfigTransport;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One watched key: its listeners in registration order and the last fingerprint seen.
#[derive(Clone)]
struct Registration {
    fingerprint: Fingerprint,
    listeners: Vec<ListenerRef>,
}

impl Registration {
    fn position(&self, listener: &ListenerRef) -> Option<usize> {
        self.listeners.iter().position(|l| same_listener(l, listener))
    }
}

type Entries = BTreeMap<ListenKey, Arc<Registration>>;

/// Concurrency-safe map from [`ListenKey`] to its listeners and fingerprint.
///
/// Reads are lock-free: every mutation builds a new map and swaps it in with
/// `arc-swap`, so a [`RegistrySnapshot`] never observes a half-updated
/// registration. Mutations are rare compared to snapshots, which the poll loop
/// takes once per cycle.
///
/// A key is present exactly while it has at least one listener.
pub struct ListenerRegistry {
    entries: ArcSwap<Entries>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(BTreeMap::new()),
        }
    }

    /// Register `listener` for `key`.
    ///
    /// If the key is not watched yet, its current content is fetched through
    /// `transport` to seed the fingerprint before the listener becomes
    /// visible. A configuration the server reports as missing seeds an absent
    /// fingerprint. Re-adding a listener already registered for `key` is a
    /// no-op.
    ///
    /// Returns `true` if the listener was newly registered.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Registration`] if the seed fetch fails; the
    /// registry is left unchanged.
    pub async fn add(
        &self,
        key: &ListenKey,
        listener: ListenerRef,
        transport: &dyn ConfigTransport,
    ) -> Result<bool> {
        if let Some(added) = self.attach(key, &listener) {
            return Ok(added);
        }

        let fingerprint = match transport.fetch_content(key).await {
            Ok(content) => Fingerprint::of(&content),
            Err(e) if e.is_not_found() => Fingerprint::absent(),
            Err(e) => return Err(WatchError::registration(key, &e)),
        };

        Ok(self.insert(key, listener, fingerprint))
    }

    /// Attach to an existing registration. `None` if the key is not watched.
    fn attach(&self, key: &ListenKey, listener: &ListenerRef) -> Option<bool> {
        let mut outcome = None;
        self.entries.rcu(|current| {
            outcome = None;
            let mut next = Entries::clone(current);
            if let Some(registration) = next.get_mut(key) {
                if registration.position(listener).is_some() {
                    outcome = Some(false);
                } else {
                    Arc::make_mut(registration).listeners.push(Arc::clone(listener));
                    outcome = Some(true);
                }
            }
            next
        });
        outcome
    }

    /// Insert a seeded registration, or attach if another caller created it meanwhile.
    fn insert(&self, key: &ListenKey, listener: ListenerRef, fingerprint: Fingerprint) -> bool {
        let mut added = false;
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            match next.get_mut(key) {
                Some(registration) => {
                    added = registration.position(&listener).is_none();
                    if added {
                        Arc::make_mut(registration).listeners.push(Arc::clone(&listener));
                    }
                }
                None => {
                    added = true;
                    next.insert(
                        key.clone(),
                        Arc::new(Registration {
                            fingerprint: fingerprint.clone(),
                            listeners: vec![Arc::clone(&listener)],
                        }),
                    );
                }
            }
            next
        });
        added
    }

    /// Remove `listener` from `key`, dropping the key once it has no listeners.
    ///
    /// Removing a listener that is not registered is a no-op. Returns `true`
    /// if the listener was removed.
    pub fn remove(&self, key: &ListenKey, listener: &ListenerRef) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            removed = false;
            let mut next = Entries::clone(current);
            if let Some(registration) = next.get_mut(key) {
                if let Some(index) = registration.position(listener) {
                    removed = true;
                    if registration.listeners.len() == 1 {
                        next.remove(key);
                    } else {
                        Arc::make_mut(registration).listeners.remove(index);
                    }
                }
            }
            next
        });
        removed
    }

    /// Point-in-time view of every watched key and its fingerprint.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(self.entries.load_full())
    }

    /// Record a new fingerprint for `key`.
    ///
    /// Returns the previous fingerprint, or `None` if the key was removed
    /// concurrently, in which case nothing changes.
    pub fn update_fingerprint(&self, key: &ListenKey, fingerprint: Fingerprint) -> Option<Fingerprint> {
        let mut previous = None;
        self.entries.rcu(|current| {
            previous = None;
            let mut next = Entries::clone(current);
            if let Some(registration) = next.get_mut(key) {
                previous = Some(std::mem::replace(
                    &mut Arc::make_mut(registration).fingerprint,
                    fingerprint.clone(),
                ));
            }
            next
        });
        previous
    }

    /// Current fingerprint of `key`, if watched.
    pub fn fingerprint(&self, key: &ListenKey) -> Option<Fingerprint> {
        self.entries.load().get(key).map(|r| r.fingerprint.clone())
    }

    /// Listeners currently registered for `key`, in registration order.
    pub fn listeners(&self, key: &ListenKey) -> Vec<ListenerRef> {
        self.entries
            .load()
            .get(key)
            .map(|r| r.listeners.clone())
            .unwrap_or_default()
    }

    /// Number of watched keys.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether no key is watched.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Release every registration.
    pub fn clear(&self) {
        self.entries.store(Arc::new(BTreeMap::new()));
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the registry taken by [`ListenerRegistry::snapshot`].
///
/// Keys iterate in a stable order.
#[derive(Clone)]
pub struct RegistrySnapshot(Arc<Entries>);

impl RegistrySnapshot {
    /// Iterate over `(key, fingerprint)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ListenKey, &Fingerprint)> {
        self.0.iter().map(|(key, r)| (key, &r.fingerprint))
    }

    /// Fingerprint of `key` at the time of the snapshot.
    pub fn fingerprint(&self, key: &ListenKey) -> Option<&Fingerprint> {
        self.0.get(key).map(|r| &r.fingerprint)
    }

    /// Whether `key` was watched at the time of the snapshot.
    pub fn contains(&self, key: &ListenKey) -> bool {
        self.0.contains_key(key)
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

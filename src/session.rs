//! Explicit session context.
//!
//! Everything that would otherwise be ambient UI state (who the user is,
//! whether the client is offline, what is in the shopping cart, which actions
//! are in flight) lives here and is handed to services by reference.

use crate::{
    domain::UserId,
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::RequestCart,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub display_name: String,
}

impl SessionUser {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Process-wide offline flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    offline: Arc<AtomicBool>,
    // One backend call may pass the offline gate after a user-confirmed retry.
    retry_pass: Arc<AtomicBool>,
    events: Option<EventSender>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a [`Event::ConnectivityChanged`] whenever the flag flips.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        let previous = self.offline.swap(offline, Ordering::SeqCst);
        if previous != offline {
            if offline {
                warn!("Network connection lost; switching to offline mode");
            } else {
                info!("Network connection restored");
            }
            if let Some(events) = &self.events {
                events.emit(Event::ConnectivityChanged { offline });
            }
        }
    }

    /// Fails fast with an offline error when the flag is set, unless a retry
    /// pass is armed, in which case the pass is consumed.
    pub fn ensure_online(&self, action: &str) -> Result<(), ServiceError> {
        if self.is_offline() {
            if self.retry_pass.swap(false, Ordering::SeqCst) {
                debug!(action, "Offline; letting a retried call through");
                return Ok(());
            }
            return Err(ServiceError::Offline(format!("{} requires a connection", action)));
        }
        Ok(())
    }

    /// Lets the next backend call through while offline. Its outcome decides
    /// whether the flag clears or stays set.
    pub fn allow_retry(&self) {
        if self.is_offline() {
            self.retry_pass.store(true, Ordering::SeqCst);
        }
    }

    /// Feeds the outcome of a backend call into network-loss detection.
    pub fn observe<T>(&self, result: &Result<T, ServiceError>) {
        self.retry_pass.store(false, Ordering::SeqCst);
        match result {
            Ok(_) => self.set_offline(false),
            Err(ServiceError::NetworkError(_)) => self.set_offline(true),
            Err(_) => {}
        }
    }
}

/// Set of actions currently in flight. An action key can only be held once.
#[derive(Debug)]
pub struct BusyFlags<K: Eq + Hash> {
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash> Default for BusyFlags<K> {
    fn default() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash> Clone for BusyFlags<K> {
    fn clone(&self) -> Self {
        Self {
            active: self.active.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> BusyFlags<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<K>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Marks `key` busy until the returned guard is dropped.
    pub fn acquire(&self, key: K) -> Result<BusyGuard<K>, ServiceError> {
        let mut active = self.lock();
        if !active.insert(key.clone()) {
            return Err(ServiceError::Busy(format!("{:?} is already running", key)));
        }
        Ok(BusyGuard {
            active: self.active.clone(),
            key: Some(key),
        })
    }

    pub fn is_busy(&self, key: &K) -> bool {
        self.lock().contains(key)
    }
}

/// Releases its busy flag on drop.
#[derive(Debug)]
pub struct BusyGuard<K: Eq + Hash> {
    active: Arc<Mutex<HashSet<K>>>,
    key: Option<K>,
}

impl<K: Eq + Hash> Drop for BusyGuard<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut active = match self.active.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            active.remove(&key);
        }
    }
}

/// The signed-in user's working context.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub connectivity: Connectivity,
    pub cart: RequestCart,
}

impl Session {
    pub fn new(user: SessionUser) -> Self {
        Self {
            user,
            connectivity: Connectivity::new(),
            cart: RequestCart::new(),
        }
    }

    pub fn with_connectivity(user: SessionUser, connectivity: Connectivity) -> Self {
        Self {
            user,
            connectivity,
            cart: RequestCart::new(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

//! Subscription registry.
//!
//! Maps a payload [`TypeId`] to its bucket: the list of live subscriptions
//! for that type, kept sorted ascending by priority with insertion order
//! preserved among equal priorities.
//!
//! # Locking
//!
//! One coarse [`Mutex`] guards every bucket. Subscriber counts are small
//! (tens, not thousands), so insert/remove/copy under a single lock keeps the
//! hold times short. Handlers never run while the lock is held: the
//! dispatcher copies a bucket with [`SubscriptionRegistry::snapshot`] and
//! iterates the copy, which lets handlers subscribe and unsubscribe freely.
//!
//! The same lock guards the closed flag set by [`SubscriptionRegistry::close`],
//! so no subscribe call can slip in after teardown.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::error::HubError;
use super::subscription::{ErasedHandler, Subscription, SubscriptionId};

/// Point-in-time copy of one bucket, in delivery order.
///
/// Buckets rarely exceed a handful of entries, so the copy usually stays on
/// the stack.
pub type Snapshot = SmallVec<[Arc<Subscription>; 8]>;

type Buckets = FxHashMap<TypeId, Vec<Arc<Subscription>>>;

#[derive(Default)]
struct State {
    buckets: Buckets,
    closed: bool,
}

/// Thread-safe map from payload type to its ordered subscriptions.
pub struct SubscriptionRegistry {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
        }
    }

    // Handlers run outside the lock, so a poisoned guard still holds
    // consistent buckets.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for payloads keyed by `key`.
    ///
    /// The new subscription is placed after every existing subscription with
    /// a priority lower than or equal to `priority`, which keeps the bucket
    /// sorted and ties in subscribe-call order.
    ///
    /// Fails with [`HubError::Disposed`] once the registry is closed.
    pub fn subscribe(
        &self,
        key: TypeId,
        event_type: &'static str,
        priority: i32,
        once: bool,
        handler: Box<dyn ErasedHandler>,
    ) -> Result<SubscriptionId, HubError> {
        let mut state = self.lock();
        if state.closed {
            return Err(HubError::Disposed);
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Arc::new(Subscription::new(
            id, key, event_type, priority, once, handler,
        ));
        let bucket = state.buckets.entry(key).or_default();
        let at = bucket.partition_point(|s| s.priority() <= priority);
        bucket.insert(at, sub);
        debug!(
            "Subscribed {} to {} (priority {}, once {}, bucket size {})",
            id,
            event_type,
            priority,
            once,
            bucket.len()
        );
        Ok(id)
    }

    /// Remove one subscription. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, key: TypeId, id: SubscriptionId) {
        let mut state = self.lock();
        Self::remove_locked(&mut state.buckets, key, &[id]);
    }

    /// Remove one subscription at most once across all callers sharing
    /// `done`.
    ///
    /// The flag is checked and set while the registry lock is held, so two
    /// racing callers cannot both observe "not yet done". Returns `true` for
    /// the caller whose call took effect.
    pub(crate) fn unsubscribe_once(
        &self,
        key: TypeId,
        id: SubscriptionId,
        done: &AtomicBool,
    ) -> bool {
        let mut state = self.lock();
        if done.load(Ordering::Acquire) {
            return false;
        }
        done.store(true, Ordering::Release);
        Self::remove_locked(&mut state.buckets, key, &[id]);
        true
    }

    /// Remove a batch of subscriptions from the live bucket for `key`.
    pub fn remove_many(&self, key: TypeId, ids: &[SubscriptionId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut state = self.lock();
        Self::remove_locked(&mut state.buckets, key, ids)
    }

    fn remove_locked(buckets: &mut Buckets, key: TypeId, ids: &[SubscriptionId]) -> usize {
        let Some(bucket) = buckets.get_mut(&key) else {
            return 0;
        };
        let before = bucket.len();
        bucket.retain(|s| !ids.contains(&s.id()));
        let removed = before - bucket.len();
        if bucket.is_empty() {
            buckets.remove(&key);
        }
        if removed > 0 {
            debug!("Removed {} subscription(s) {:?}", removed, ids);
        }
        removed
    }

    /// Copy the bucket for `key` in delivery order. Empty when nothing is
    /// registered.
    pub fn snapshot(&self, key: TypeId) -> Snapshot {
        self.lock()
            .buckets
            .get(&key)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live subscriptions for `key`.
    pub fn len(&self, key: TypeId) -> usize {
        self.lock().buckets.get(&key).map_or(0, Vec::len)
    }

    /// Total live subscriptions across every bucket.
    pub fn total(&self) -> usize {
        self.lock().buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buckets.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Retire and drop every subscription, then refuse new ones.
    ///
    /// Retiring first means a dispatch pass already iterating a snapshot stops
    /// delivering as soon as teardown happens. Returns how many were dropped;
    /// closing again drops nothing.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let mut dropped = 0;
        for sub in state.buckets.values().flatten() {
            sub.retire();
            dropped += 1;
        }
        state.buckets.clear();
        dropped
    }
}

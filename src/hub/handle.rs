//! Revocation handle for a single subscription.

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::registry::SubscriptionRegistry;
use super::subscription::SubscriptionId;

/// Capability to remove exactly one subscription.
///
/// The handle only references the registry weakly plus the subscription's
/// identity; it never keeps the registry or the callback alive. Dropping a
/// handle leaves the subscription in place.
///
/// [`dispose`](SubscriptionHandle::dispose) may be called any number of
/// times, from any thread. Only the first call has an effect.
pub struct SubscriptionHandle {
    registry: Weak<SubscriptionRegistry>,
    key: TypeId,
    id: SubscriptionId,
    done: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        registry: &Arc<SubscriptionRegistry>,
        key: TypeId,
        id: SubscriptionId,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            key,
            id,
            done: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether this handle has already disposed its subscription.
    ///
    /// Stays `false` when the subscription ended some other way (one-shot,
    /// until-condition or hub teardown).
    pub fn is_disposed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Remove the subscription from its bucket.
    ///
    /// Takes effect for the next payload; a delivery pass already in progress
    /// still reaches it. Returns `true` for the call that actually removed it.
    pub fn dispose(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe_once(self.key, self.id, &self.done),
            None => !self.done.swap(true, Ordering::AcqRel),
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

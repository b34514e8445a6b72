//! Subscription records stored in the registry.
//!
//! A [`Subscription`] pairs the bookkeeping the registry and dispatcher need
//! (identity, priority, one-shot flag, retired flag) with a type-erased
//! [`ErasedHandler`]. Callers only ever see typed closures; the erasure
//! happens once, in [`TypedHandler`], so heterogeneous payload types can share
//! one registry.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Marker for types that can travel through the hub.
///
/// Blanket-implemented for every `Send + 'static` type; payloads are routed by
/// their [`TypeId`].
pub trait Payload: Any + Send + 'static {}

impl<T: Any + Send + 'static> Payload for T {}

/// Callback invoked with each delivered payload.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Predicate evaluated against a payload (filters and until-conditions).
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Unique subscription identifier, monotonically assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Type-erased view of a typed handler, used at the registry/dispatch boundary.
///
/// Every method receives the payload as `&dyn Any`; implementations downcast
/// to their concrete type and treat a mismatch as "not for me".
pub trait ErasedHandler: Send + Sync {
    /// Returns `true` when the optional filter lets `payload` through.
    fn accepts(&self, payload: &dyn Any) -> bool;
    /// Runs the user callback.
    fn invoke(&self, payload: &dyn Any);
    /// Returns `true` when the until-condition says this was the last delivery.
    fn finished(&self, payload: &dyn Any) -> bool;
}

/// Concrete handler for payload type `T`.
pub struct TypedHandler<T> {
    callback: Callback<T>,
    filter: Option<Predicate<T>>,
    until: Option<Predicate<T>>,
}

impl<T: Payload> TypedHandler<T> {
    pub fn new(callback: Callback<T>) -> Self {
        Self {
            callback,
            filter: None,
            until: None,
        }
    }

    /// Only deliver payloads for which `filter` returns `true`.
    pub fn with_filter(mut self, filter: Option<Predicate<T>>) -> Self {
        self.filter = filter;
        self
    }

    /// Retire the subscription after the first delivery for which `until`
    /// returns `true`.
    pub fn with_until(mut self, until: Option<Predicate<T>>) -> Self {
        self.until = until;
        self
    }
}

impl<T: Payload> ErasedHandler for TypedHandler<T> {
    fn accepts(&self, payload: &dyn Any) -> bool {
        let Some(payload) = payload.downcast_ref::<T>() else {
            return false;
        };
        self.filter.as_ref().is_none_or(|filter| filter(payload))
    }

    fn invoke(&self, payload: &dyn Any) {
        if let Some(payload) = payload.downcast_ref::<T>() {
            (self.callback)(payload);
        }
    }

    fn finished(&self, payload: &dyn Any) -> bool {
        match (self.until.as_ref(), payload.downcast_ref::<T>()) {
            (Some(until), Some(payload)) => until(payload),
            _ => false,
        }
    }
}

/// One registered interest in a payload type.
///
/// Owned by the registry (shared into dispatch snapshots through `Arc`).
/// The only mutation after creation is retiring it.
pub struct Subscription {
    id: SubscriptionId,
    key: TypeId,
    event_type: &'static str,
    priority: i32,
    once: bool,
    retired: AtomicBool,
    handler: Box<dyn ErasedHandler>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        key: TypeId,
        event_type: &'static str,
        priority: i32,
        once: bool,
        handler: Box<dyn ErasedHandler>,
    ) -> Self {
        Self {
            id,
            key,
            event_type,
            priority,
            once,
            retired: AtomicBool::new(false),
            handler,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn key(&self) -> TypeId {
        self.key
    }

    /// Name of the payload type, for diagnostics.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Whether a one-shot/until completion or hub teardown already retired
    /// this subscription. Retired subscriptions are skipped even by snapshots
    /// that still contain them.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Retire the subscription. Returns `true` only for the caller that
    /// performed the transition, so completion is claimed exactly once even
    /// when dispatches nest.
    pub(crate) fn retire(&self) -> bool {
        self.retired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn handler(&self) -> &dyn ErasedHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("retired", &self.is_retired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Ping(u32);
    struct Pong;

    fn counting_handler(count: Arc<AtomicUsize>) -> TypedHandler<Ping> {
        TypedHandler::new(Arc::new(move |_: &Ping| {
            count.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_handler_ignores_foreign_payloads() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(count.clone());

        assert!(!handler.accepts(&Pong));
        handler.invoke(&Pong);
        assert!(!handler.finished(&Pong));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_filter_and_until() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(count.clone())
            .with_filter(Some(Arc::new(|p: &Ping| p.0 > 5)))
            .with_until(Some(Arc::new(|p: &Ping| p.0 == 10)));

        assert!(!handler.accepts(&Ping(3)));
        assert!(handler.accepts(&Ping(7)));
        handler.invoke(&Ping(7));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!handler.finished(&Ping(7)));
        assert!(handler.finished(&Ping(10)));
    }

    #[test]
    fn test_retire_is_claimed_once() {
        let sub = Subscription::new(
            SubscriptionId(1),
            TypeId::of::<Ping>(),
            "Ping",
            0,
            true,
            Box::new(counting_handler(Arc::new(AtomicUsize::new(0)))),
        );
        assert!(!sub.is_retired());
        assert!(sub.retire());
        assert!(!sub.retire());
        assert!(sub.is_retired());
    }

    #[test]
    fn test_subscription_id_display() {
        assert_eq!(SubscriptionId(42).to_string(), "sub-42");
    }
}

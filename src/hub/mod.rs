//! In-process typed publish/subscribe hub.
//!
//! [`EventHub`] decouples producers of gameplay events from the listeners
//! that react to them:
//!
//! - Producers on any thread call [`EventHub::enqueue`]; payloads wait in a
//!   FIFO [`PendingQueue`](queue::PendingQueue).
//! - The thread owning the frame loop calls [`EventHub::flush_all`] once per
//!   tick, which delivers every queued payload in submission order.
//! - The owning thread may also bypass the queue with
//!   [`EventHub::publish_immediate`].
//! - Consumers register through [`EventHub::subscribe`], configure priority,
//!   filter, one-shot and until-conditions on the returned
//!   [`SubscriptionBuilder`], and get back a [`SubscriptionHandle`].
//!
//! Within one payload, listeners run by ascending priority (ties in
//! subscribe order). A panicking listener is contained; the rest still run.
//!
//! The hub is a cheap `Clone` handle over shared state: construct it once and
//! pass it to whoever needs it. Whoever constructed it owns
//! [`EventHub::dispose`].
//!
//! Submodules:
//! - [`registry`] – per-type buckets of subscriptions under one lock
//! - [`queue`] – multi-producer pending queue
//! - [`dispatcher`] – delivery passes, fault isolation, flush
//! - [`builder`] – fluent subscription configuration
//! - [`handle`] – idempotent subscription revocation
//! - [`subscription`] – subscription records and type erasure
//! - [`stats`] – hub counters
//! - [`error`] – configuration errors

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod subscription;

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, trace};

pub use self::builder::SubscriptionBuilder;
pub use self::dispatcher::{FaultStage, HandlerFault};
pub use self::error::HubError;
pub use self::handle::SubscriptionHandle;
pub use self::stats::StatsSnapshot;
pub use self::subscription::{Payload, SubscriptionId};

use self::dispatcher::Dispatcher;
use self::queue::PendingQueue;
use self::registry::SubscriptionRegistry;
use self::stats::HubStats;
use crate::resources::hubconfig::HubConfig;

/// State shared by every clone of an [`EventHub`] and by its builders.
pub(crate) struct HubInner {
    pub(crate) registry: Arc<SubscriptionRegistry>,
    queue: PendingQueue,
    dispatcher: Dispatcher,
    stats: Arc<HubStats>,
    disposed: AtomicBool,
}

impl HubInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Typed event hub. See the [module documentation](self).
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    /// Create a hub with default settings.
    pub fn new() -> Self {
        Self::with_config(&HubConfig::new())
    }

    /// Create a hub using the `[hub]` settings of `config`.
    pub fn with_config(config: &HubConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let stats = Arc::new(HubStats::default());
        let dispatcher = Dispatcher::new(registry.clone(), stats.clone())
            .with_fault_logging(config.log_handler_faults)
            .with_queue_warn_depth(config.queue_warn_depth);

        info!(
            "EventHub initialized (log_handler_faults={}, queue_warn_depth={}).",
            config.log_handler_faults, config.queue_warn_depth
        );
        Self {
            inner: Arc::new(HubInner {
                registry,
                queue: PendingQueue::new(),
                dispatcher,
                stats,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue `payload` for the next [`flush_all`](Self::flush_all).
    ///
    /// Safe from any thread and never blocks. Ignored once the hub is
    /// disposed.
    pub fn enqueue<T: Payload>(&self, payload: T) {
        if self.inner.is_disposed() {
            trace!("Hub disposed, dropping {}.", std::any::type_name::<T>());
            return;
        }
        self.inner.queue.enqueue(Box::new(payload));
        HubStats::bump(&self.inner.stats.enqueued);

        // Lost a race with dispose(): its discard may already have run.
        if self.inner.is_disposed() {
            self.inner.queue.discard_all();
        }
    }

    /// Like [`enqueue`](Self::enqueue), but `None` is silently ignored so
    /// producers can post optional results without checking them first.
    pub fn enqueue_opt<T: Payload>(&self, payload: Option<T>) {
        if let Some(payload) = payload {
            self.enqueue(payload);
        }
    }

    /// Deliver `payload` right now, on the calling thread.
    ///
    /// Only call this from the thread that runs `flush_all`: immediate and
    /// queued deliveries are not ordered against each other. Returns the
    /// number of listeners that ran to completion.
    pub fn publish_immediate<T: Payload>(&self, payload: T) -> usize {
        let payload: &dyn Any = &payload;
        self.inner.dispatcher.dispatch_immediate(payload)
    }

    /// Start configuring a subscription to payloads of type `T`.
    pub fn subscribe<T: Payload>(&self) -> SubscriptionBuilder<T> {
        SubscriptionBuilder::new(self.inner.clone())
    }

    /// Drain the pending queue and deliver each payload in submission order.
    ///
    /// Call once per tick from the owning thread. Payloads queued by
    /// listeners during the flush are delivered on the next one. Returns the
    /// number of payloads drained; re-entrant calls from a listener return 0,
    /// and so does every call after [`dispose`](Self::dispose).
    pub fn flush_all(&self) -> usize {
        if self.inner.is_disposed() {
            self.inner.queue.discard_all();
            return 0;
        }
        self.inner.dispatcher.flush_all(&self.inner.queue)
    }

    /// Observe every panic caught during delivery.
    pub fn set_fault_observer(&self, observer: impl Fn(&HandlerFault) + Send + Sync + 'static) {
        self.inner.dispatcher.set_fault_observer(Some(Arc::new(observer)));
    }

    pub fn clear_fault_observer(&self) {
        self.inner.dispatcher.set_fault_observer(None);
    }

    /// Tear the hub down: drop every subscription and discard pending payloads
    /// without delivering them. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions = self.inner.registry.close();
        let discarded = self.inner.queue.discard_all();
        self.inner.dispatcher.set_fault_observer(None);
        info!(
            "EventHub disposed ({} subscription(s) dropped, {} pending payload(s) discarded).",
            subscriptions, discarded
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Live subscriptions for payload type `T`.
    pub fn subscriber_count<T: Payload>(&self) -> usize {
        self.inner.registry.len(TypeId::of::<T>())
    }

    /// Payloads waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Ping(u8);

    #[test]
    fn test_enqueue_waits_for_flush() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.subscribe::<Ping>()
            .register(move |p| sink.lock().unwrap().push(p.0))
            .unwrap();

        hub.enqueue(Ping(1));
        hub.enqueue(Ping(2));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(hub.pending_len(), 2);

        assert_eq!(hub.flush_all(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(hub.pending_len(), 0);
    }

    #[test]
    fn test_enqueue_opt_ignores_none() {
        let hub = EventHub::new();
        hub.enqueue_opt::<Ping>(None);
        hub.enqueue_opt(Some(Ping(3)));
        assert_eq!(hub.pending_len(), 1);
        assert_eq!(hub.stats().enqueued, 1);
    }

    #[test]
    fn test_dispose_discards_and_rejects() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        hub.subscribe::<Ping>()
            .register(move |_| *sink.lock().unwrap() += 1)
            .unwrap();
        hub.enqueue(Ping(1));

        hub.dispose();
        hub.dispose();
        assert!(hub.is_disposed());
        assert_eq!(hub.pending_len(), 0);
        assert_eq!(hub.subscriber_count::<Ping>(), 0);

        hub.enqueue(Ping(2));
        assert_eq!(hub.flush_all(), 0);
        assert_eq!(hub.publish_immediate(Ping(3)), 0);
        assert_eq!(*seen.lock().unwrap(), 0);
        assert!(matches!(
            hub.subscribe::<Ping>().register(|_| {}),
            Err(HubError::Disposed)
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let hub = EventHub::new();
        let other = hub.clone();
        other.subscribe::<Ping>().register(|_| {}).unwrap();
        other.enqueue(Ping(1));
        assert_eq!(hub.subscriber_count::<Ping>(), 1);
        assert_eq!(hub.pending_len(), 1);
    }

    #[test]
    fn test_reentrant_flush_is_refused() {
        let hub = EventHub::new();
        let inner_result = Arc::new(Mutex::new(None));
        let sink = inner_result.clone();
        let reentrant = hub.clone();
        hub.subscribe::<Ping>()
            .register(move |_| *sink.lock().unwrap() = Some(reentrant.flush_all()))
            .unwrap();

        hub.enqueue(Ping(1));
        assert_eq!(hub.flush_all(), 1);
        assert_eq!(*inner_result.lock().unwrap(), Some(0));
    }
}

//! Dispatcher: delivers payloads to registry snapshots.
//!
//! # Delivery pass
//!
//! For one payload the dispatcher:
//!
//! 1. Copies the payload type's bucket out of the registry.
//! 2. Walks the copy in priority order, skipping retired subscriptions and
//!    those whose filter rejects the payload.
//! 3. Invokes each remaining callback. Panics are caught and reported as a
//!    [`HandlerFault`]; they never reach the producer or the flush caller.
//! 4. Collects one-shot subscriptions that fired and until-subscriptions whose
//!    condition became true, then removes them from the live bucket once the
//!    walk is over.
//!
//! Handlers may subscribe or unsubscribe during a pass. Those changes apply to
//! the next payload; the copy being walked is never touched.
//!
//! Catching a panic does not bypass the process panic hook, so the default
//! hook still prints each one to stderr. `log_handler_faults` only controls
//! the `warn!` line. Embedders wanting silence install their own hook with
//! [`std::panic::set_hook`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace, warn};
use smallvec::SmallVec;

use super::queue::PendingQueue;
use super::registry::SubscriptionRegistry;
use super::stats::HubStats;
use super::subscription::{Subscription, SubscriptionId};

/// Which part of a subscription faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Filter,
    Callback,
    Until,
}

/// A panic caught while delivering a payload.
#[derive(Debug, Clone)]
pub struct HandlerFault {
    /// Payload type name.
    pub event_type: &'static str,
    /// Subscription whose code panicked.
    pub subscription: SubscriptionId,
    pub stage: FaultStage,
    /// Panic message, when it was a string.
    pub message: String,
}

/// Callback notified of every [`HandlerFault`].
pub type FaultObserver = Arc<dyn Fn(&HandlerFault) + Send + Sync>;

/// Runs delivery passes against a shared registry.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<HubStats>,
    observer: RwLock<Option<FaultObserver>>,
    log_faults: bool,
    queue_warn_depth: usize,
    flushing: AtomicBool,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>, stats: Arc<HubStats>) -> Self {
        Self {
            registry,
            stats,
            observer: RwLock::new(None),
            log_faults: true,
            queue_warn_depth: usize::MAX,
            flushing: AtomicBool::new(false),
        }
    }

    /// Enable or disable `warn!` logging of caught faults.
    pub fn with_fault_logging(mut self, enabled: bool) -> Self {
        self.log_faults = enabled;
        self
    }

    /// Warn when a single flush drains more than `depth` payloads.
    pub fn with_queue_warn_depth(mut self, depth: usize) -> Self {
        self.queue_warn_depth = depth;
        self
    }

    /// Install or clear the fault observer.
    pub fn set_fault_observer(&self, observer: Option<FaultObserver>) {
        *self
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = observer;
    }

    /// Deliver `payload` to every matching subscription.
    ///
    /// Returns the number of callbacks that ran to completion. A payload type
    /// nobody subscribed to is a no-op.
    pub fn dispatch(&self, payload: &dyn Any) -> usize {
        let key = payload.type_id();
        HubStats::bump(&self.stats.dispatched);

        let snapshot = self.registry.snapshot(key);
        if snapshot.is_empty() {
            trace!("No subscribers for payload, skipping.");
            return 0;
        }

        let mut completed: SmallVec<[SubscriptionId; 4]> = SmallVec::new();
        let mut delivered = 0usize;
        let mut filtered = 0u64;

        for sub in &snapshot {
            if sub.is_retired() {
                continue;
            }
            let handler = sub.handler();

            match catch_unwind(AssertUnwindSafe(|| handler.accepts(payload))) {
                Ok(true) => {}
                Ok(false) => {
                    filtered += 1;
                    continue;
                }
                Err(panic) => {
                    self.report(sub, FaultStage::Filter, panic);
                    continue;
                }
            }

            // Claim the one-shot before running it, so a nested dispatch of the
            // same type cannot fire it a second time.
            if sub.is_once() {
                if !sub.retire() {
                    continue;
                }
                completed.push(sub.id());
            }

            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.invoke(payload))) {
                self.report(sub, FaultStage::Callback, panic);
                continue;
            }
            delivered += 1;

            if sub.is_once() {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| handler.finished(payload))) {
                Ok(true) => {
                    if sub.retire() {
                        completed.push(sub.id());
                    }
                }
                Ok(false) => {}
                Err(panic) => self.report(sub, FaultStage::Until, panic),
            }
        }

        let removed = self.registry.remove_many(key, &completed);
        HubStats::add(&self.stats.delivered, delivered as u64);
        HubStats::add(&self.stats.filtered, filtered);
        HubStats::add(&self.stats.completed, removed as u64);
        trace!(
            "Dispatched payload to {}/{} subscriber(s), {} completed.",
            delivered,
            snapshot.len(),
            removed
        );
        delivered
    }

    /// Same as [`Dispatcher::dispatch`], run on the caller's thread without
    /// touching the pending queue.
    pub fn dispatch_immediate(&self, payload: &dyn Any) -> usize {
        self.dispatch(payload)
    }

    /// Drain `queue` and dispatch each payload in submission order.
    ///
    /// Returns the number of payloads drained. Calling this from inside a
    /// handler while a flush is running is refused and returns 0.
    pub fn flush_all(&self, queue: &PendingQueue) -> usize {
        if self.flushing.swap(true, Ordering::AcqRel) {
            warn!("flush_all called while a flush is already running; ignored.");
            return 0;
        }
        let _guard = FlushGuard(&self.flushing);

        let batch = queue.drain_all();
        if batch.len() > self.queue_warn_depth {
            warn!(
                "Flushing {} pending payloads (warn depth {}).",
                batch.len(),
                self.queue_warn_depth
            );
        }

        let drained = batch.len();
        for payload in batch {
            let payload: &dyn Any = &*payload;
            self.dispatch(payload);
        }
        HubStats::bump(&self.stats.flushes);
        if drained > 0 {
            debug!("Flushed {} payload(s).", drained);
        }
        drained
    }

    fn report(&self, sub: &Subscription, stage: FaultStage, panic: Box<dyn Any + Send>) {
        HubStats::bump(&self.stats.faults);
        let fault = HandlerFault {
            event_type: sub.event_type(),
            subscription: sub.id(),
            stage,
            message: panic_message(panic.as_ref()),
        };
        if self.log_faults {
            warn!(
                "{:?} of {} on {} panicked: {}",
                fault.stage, fault.subscription, fault.event_type, fault.message
            );
        }

        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            if catch_unwind(AssertUnwindSafe(|| observer(&fault))).is_err() {
                warn!("Fault observer panicked while handling {}.", fault.subscription);
            }
        }
    }
}

/// Clears the re-entrancy flag even if something below unwinds.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Fluent subscription builder.
//!
//! Obtained from [`EventHub::subscribe`](super::EventHub::subscribe). Every
//! configuration call returns a fresh builder and leaves the receiver
//! untouched, so a partially configured builder can be kept around and
//! branched:
//!
//! ```ignore
//! let damage = hub.subscribe::<Damage>().with_priority(-5);
//! let big_hits = damage.when(|d| d.amount > 50);
//! damage.register(|d| log::info!("hit for {}", d.amount))?;
//! big_hits.once().register(|_| log::info!("first big hit"))?;
//! ```

use std::any::{TypeId, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use super::HubInner;
use super::error::HubError;
use super::handle::SubscriptionHandle;
use super::subscription::{Payload, Predicate, TypedHandler};

/// Immutable subscription configuration for payload type `T`.
pub struct SubscriptionBuilder<T> {
    inner: Arc<HubInner>,
    priority: i32,
    filter: Option<Predicate<T>>,
    once: bool,
    until: Option<Predicate<T>>,
    _payload: PhantomData<fn(&T)>,
}

impl<T> Clone for SubscriptionBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            priority: self.priority,
            filter: self.filter.clone(),
            once: self.once,
            until: self.until.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T: Payload> SubscriptionBuilder<T> {
    pub(crate) fn new(inner: Arc<HubInner>) -> Self {
        Self {
            inner,
            priority: 0,
            filter: None,
            once: false,
            until: None,
            _payload: PhantomData,
        }
    }

    /// Delivery priority. Lower values run earlier; the default is 0.
    pub fn with_priority(&self, priority: i32) -> Self {
        Self {
            priority,
            ..self.clone()
        }
    }

    /// Only deliver payloads matching `filter`.
    ///
    /// Chained calls must all pass. Rejected payloads do not count towards
    /// [`once`](Self::once) or [`until`](Self::until).
    pub fn when(&self, filter: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let filter: Predicate<T> = match self.filter.clone() {
            Some(prev) => Arc::new(move |p: &T| prev(p) && filter(p)),
            None => Arc::new(filter),
        };
        Self {
            filter: Some(filter),
            ..self.clone()
        }
    }

    /// Remove the subscription after its first delivery.
    pub fn once(&self) -> Self {
        Self {
            once: true,
            ..self.clone()
        }
    }

    /// Remove the subscription after the first delivery for which `predicate`
    /// holds. The callback still runs for that payload.
    ///
    /// Chained calls end the subscription when any of them holds.
    pub fn until(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let until: Predicate<T> = match self.until.clone() {
            Some(prev) => Arc::new(move |p: &T| prev(p) || predicate(p)),
            None => Arc::new(predicate),
        };
        Self {
            until: Some(until),
            ..self.clone()
        }
    }

    /// Create the subscription.
    ///
    /// The builder can be reused afterwards; each call registers a new,
    /// independent subscription.
    pub fn register(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, HubError> {
        let handler = TypedHandler::<T>::new(Arc::new(callback))
            .with_filter(self.filter.clone())
            .with_until(self.until.clone());

        let key = TypeId::of::<T>();
        let id = self.inner.registry.subscribe(
            key,
            type_name::<T>(),
            self.priority,
            self.once,
            Box::new(handler),
        )?;
        Ok(SubscriptionHandle::new(&self.inner.registry, key, id))
    }
}

#[cfg(test)]
mod tests {
    use crate::hub::EventHub;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Score(i32);

    type Recorder = Box<dyn Fn(&Score) + Send + Sync>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Recorder) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Box::new(move |s: &Score| sink.lock().unwrap().push(format!("{}:{}", name, s.0)))
                as Recorder
        };
        (log, make)
    }

    #[test]
    fn test_branching_leaves_base_untouched() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        let base = hub.subscribe::<Score>().with_priority(1);
        let filtered = base.when(|s| s.0 > 10);
        let early = base.with_priority(-1);

        base.register(make("base")).unwrap();
        filtered.register(make("filtered")).unwrap();
        early.register(make("early")).unwrap();

        hub.publish_immediate(Score(5));
        hub.publish_immediate(Score(20));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["early:5", "base:5", "early:20", "base:20", "filtered:20"]
        );
    }

    #[test]
    fn test_chained_filters_all_must_pass() {
        let hub = EventHub::new();
        let (log, make) = recorder();
        hub.subscribe::<Score>()
            .when(|s| s.0 > 0)
            .when(|s| s.0 % 2 == 0)
            .register(make("even"))
            .unwrap();

        for i in [-2, 1, 2, 3, 4] {
            hub.publish_immediate(Score(i));
        }
        assert_eq!(*log.lock().unwrap(), vec!["even:2", "even:4"]);
    }

    #[test]
    fn test_chained_until_any_ends() {
        let hub = EventHub::new();
        let (log, make) = recorder();
        hub.subscribe::<Score>()
            .until(|s| s.0 == 100)
            .until(|s| s.0 < 0)
            .register(make("u"))
            .unwrap();

        for i in [1, -1, 2] {
            hub.publish_immediate(Score(i));
        }
        assert_eq!(*log.lock().unwrap(), vec!["u:1", "u:-1"]);
        assert_eq!(hub.subscriber_count::<Score>(), 0);
    }

    #[test]
    fn test_register_twice_creates_two_subscriptions() {
        let hub = EventHub::new();
        let (log, make) = recorder();
        let once = hub.subscribe::<Score>().once();
        let a = once.register(make("a")).unwrap();
        let b = once.register(make("b")).unwrap();
        assert_ne!(a.id(), b.id());

        hub.publish_immediate(Score(1));
        hub.publish_immediate(Score(2));
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }
}

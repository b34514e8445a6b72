//! Pending queue for deferred delivery.
//!
//! Any number of producer threads push type-erased payloads through an
//! unbounded `crossbeam_channel`; the thread that owns the frame loop drains
//! it once per flush. Pushing never blocks and the channel preserves global
//! submission order across every payload type.

use std::any::Any;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A payload waiting for the next flush.
pub type Pending = Box<dyn Any + Send>;

/// Multi-producer, single-consumer FIFO of pending payloads.
pub struct PendingQueue {
    tx: Sender<Pending>,
    rx: Receiver<Pending>,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Queue `payload` for the next drain.
    pub fn enqueue(&self, payload: Pending) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        if self.tx.send(payload).is_err() {
            log::error!("Pending queue disconnected, payload dropped.");
        }
    }

    /// Remove and return everything queued at the moment of the call, in
    /// submission order.
    ///
    /// The count is fixed up front, so payloads pushed while the caller is
    /// still dispatching this batch wait for the next drain.
    pub fn drain_all(&self) -> Vec<Pending> {
        let queued = self.rx.len();
        self.rx.try_iter().take(queued).collect()
    }

    /// Drop everything queued without returning it.
    pub fn discard_all(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn as_u32(p: &Pending) -> u32 {
        *p.downcast_ref::<u32>().expect("u32 payload")
    }

    #[test]
    fn test_drain_preserves_fifo_across_types() {
        let queue = PendingQueue::new();
        queue.enqueue(Box::new(1u32));
        queue.enqueue(Box::new("two"));
        queue.enqueue(Box::new(3u32));

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 3);
        assert_eq!(as_u32(&drained[0]), 1);
        assert_eq!(drained[1].downcast_ref::<&str>(), Some(&"two"));
        assert_eq!(as_u32(&drained[2]), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_queue() {
        let queue = PendingQueue::new();
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_items_pushed_after_drain_wait_for_next_drain() {
        let queue = PendingQueue::new();
        queue.enqueue(Box::new(1u32));
        let first = queue.drain_all();
        queue.enqueue(Box::new(2u32));

        assert_eq!(first.len(), 1);
        let second = queue.drain_all();
        assert_eq!(second.len(), 1);
        assert_eq!(as_u32(&second[0]), 2);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(PendingQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250u32 {
                        queue.enqueue(Box::new(t * 1000 + i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("producer thread panicked");
        }

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 1000);

        // Per-producer order survives interleaving.
        for t in 0..4u32 {
            let mine: Vec<u32> = drained
                .iter()
                .map(as_u32)
                .filter(|v| v / 1000 == t)
                .collect();
            let expected: Vec<u32> = (0..250).map(|i| t * 1000 + i).collect();
            assert_eq!(mine, expected);
        }
    }

    #[test]
    fn test_discard_all() {
        let queue = PendingQueue::new();
        queue.enqueue(Box::new(1u32));
        queue.enqueue(Box::new(2u32));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.discard_all(), 2);
        assert!(queue.is_empty());
    }
}

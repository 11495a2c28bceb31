//! Fan-out of commit events with replay of the latest one.

use crate::defaults;
use crate::events::types::GlossSequenceEvent;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

struct BusInner {
    last: Option<GlossSequenceEvent>,
    subscribers: Vec<Sender<GlossSequenceEvent>>,
}

/// Explicitly owned event channel between the accumulator and consumers.
///
/// Each subscriber gets a bounded channel of one replay slot plus
/// `extra_capacity`; publishing blocks while a subscriber is full.
pub struct EventBus {
    inner: Mutex<BusInner>,
    extra_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(defaults::BUS_EXTRA_CAPACITY)
    }
}

impl EventBus {
    pub fn new(extra_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                last: None,
                subscribers: Vec::new(),
            }),
            extra_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish to every subscriber, blocking on full ones.
    ///
    /// Returns false for empty events, which are dropped.
    pub fn publish(&self, event: GlossSequenceEvent) -> bool {
        if event.is_empty() {
            tracing::debug!(kind = event.kind(), "dropping empty event");
            return false;
        }

        let subscribers = {
            let mut inner = self.lock();
            inner.last = Some(event.clone());
            inner.subscribers.clone()
        };

        let mut gone = Vec::new();
        for subscriber in subscribers {
            if subscriber.send(event.clone()).is_err() {
                gone.push(subscriber);
            }
        }
        if !gone.is_empty() {
            self.lock()
                .subscribers
                .retain(|s| !gone.iter().any(|g| g.same_channel(s)));
            tracing::debug!(removed = gone.len(), "pruned closed subscribers");
        }

        tracing::debug!(kind = event.kind(), "event published");
        true
    }

    /// Subscribe; the latest event, if any, is delivered first.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = bounded(1 + self.extra_capacity);
        let mut inner = self.lock();
        if let Some(last) = &inner.last
            && tx.try_send(last.clone()).is_err()
        {
            tracing::warn!("replay slot unavailable for new subscriber");
        }
        inner.subscribers.push(tx);
        EventSubscription { rx }
    }

    pub fn last_event(&self) -> Option<GlossSequenceEvent> {
        self.lock().last.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn capacity_per_subscriber(&self) -> usize {
        1 + self.extra_capacity
    }
}

/// Receiving side of a bus subscription. Dropping it unsubscribes.
pub struct EventSubscription {
    rx: Receiver<GlossSequenceEvent>,
}

impl EventSubscription {
    /// Block until an event arrives; `None` once the bus is gone.
    pub fn recv(&self) -> Option<GlossSequenceEvent> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<GlossSequenceEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<GlossSequenceEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Events currently buffered.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn drain(&self) -> Vec<GlossSequenceEvent> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn seq(tokens: &[&str]) -> GlossSequenceEvent {
        GlossSequenceEvent::sequence(tokens.iter().map(|t| t.to_string()).collect(), 0)
    }

    #[test]
    fn test_empty_events_dropped() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        assert!(!bus.publish(seq(&[])));
        assert!(!bus.publish(GlossSequenceEvent::word("", 0)));
        assert!(sub.try_recv().is_none());
        assert!(bus.last_event().is_none());
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert!(bus.publish(seq(&["HELLO"])));
        assert_eq!(a.try_recv(), Some(seq(&["HELLO"])));
        assert_eq!(b.try_recv(), Some(seq(&["HELLO"])));
    }

    #[test]
    fn test_late_subscriber_sees_latest() {
        let bus = EventBus::default();
        bus.publish(seq(&["ONE"]));
        bus.publish(seq(&["TWO"]));
        let late = bus.subscribe();
        assert_eq!(late.drain(), vec![seq(&["TWO"])]);
    }

    #[test]
    fn test_order_preserved() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        bus.publish(seq(&["A"]));
        bus.publish(GlossSequenceEvent::word("CAT", 1));
        bus.publish(seq(&["B"]));
        let kinds: Vec<&str> = sub.drain().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["sequence_ready", "word_committed", "sequence_ready"]);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        drop(sub);
        bus.publish(seq(&["A"]));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_full_subscriber_blocks_publisher() {
        let bus = Arc::new(EventBus::new(1));
        let sub = bus.subscribe();
        bus.publish(seq(&["1"]));
        bus.publish(seq(&["2"]));

        let done = Arc::new(AtomicBool::new(false));
        let publisher = {
            let bus = Arc::clone(&bus);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                bus.publish(seq(&["3"]));
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst), "publish should block while full");

        assert_eq!(sub.recv(), Some(seq(&["1"])));
        publisher.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(sub.drain(), vec![seq(&["2"]), seq(&["3"])]);
    }
}

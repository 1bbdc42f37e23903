//! The event bus: synchronous typed pub/sub with causal ordering.
//!
//! Delivery is synchronous, in source order, to the subscriber list
//! captured at dispatch time. Emitting from inside a handler is allowed
//! and queued until the current dispatch completes, which preserves
//! causal order. Handler panics are caught and reported as
//! [`StoryEvent::HandlerError`]; they never halt delivery to other
//! subscribers.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::{EventKind, StoryEvent};

type Handler = Arc<dyn Fn(&StoryEvent) + Send + Sync>;

/// Default debug ring-buffer capacity.
const DEFAULT_RECENT_CAPACITY: usize = 64;

struct BusState {
    subscribers: HashMap<EventKind, Vec<(u64, Handler)>>,
    next_id: u64,
    /// True while a dispatch loop is draining the queue; re-entrant
    /// emits enqueue instead of dispatching.
    dispatching: bool,
    queue: VecDeque<StoryEvent>,
    /// Last K dispatched events, for debug inspection only.
    recent: VecDeque<StoryEvent>,
    capacity: usize,
}

/// Typed publish/subscribe bus. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }

    /// Create a bus retaining the last `capacity` events for debugging.
    /// The capacity has no functional effect on delivery.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                subscribers: HashMap::new(),
                next_id: 0,
                dispatching: false,
                queue: VecDeque::new(),
                recent: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Register a handler for one event kind. The returned
    /// [`Subscription`] removes the handler when `unsubscribe` is called.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&StoryEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            state: Arc::clone(&self.state),
            kind,
            id,
        }
    }

    /// Publish an event. If a dispatch is already in progress on this
    /// bus, the event is queued and delivered after the current dispatch
    /// completes.
    pub fn emit(&self, event: StoryEvent) {
        {
            let mut state = self.state.lock();
            state.queue.push_back(event);
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let (event, handlers) = {
                let mut state = self.state.lock();
                let Some(event) = state.queue.pop_front() else {
                    state.dispatching = false;
                    return;
                };
                if state.recent.len() == state.capacity {
                    state.recent.pop_front();
                }
                if state.capacity > 0 {
                    state.recent.push_back(event.clone());
                }
                let handlers: Vec<Handler> = state
                    .subscribers
                    .get(&event.kind())
                    .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default();
                (event, handlers)
            };

            for handler in handlers {
                if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                    tracing::warn!(kind = ?event.kind(), "event handler panicked");
                    // Report the failure unless the failing handler was
                    // itself a HandlerError subscriber (avoids a loop).
                    if event.kind() != EventKind::HandlerError {
                        self.state.lock().queue.push_back(StoryEvent::HandlerError {
                            kind: event.kind(),
                            message: "subscriber panicked during delivery".into(),
                        });
                    }
                }
            }
        }
    }

    /// The last K dispatched events, oldest first.
    pub fn recent(&self) -> Vec<StoryEvent> {
        self.state.lock().recent.iter().cloned().collect()
    }

    /// Number of handlers currently registered for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.state
            .lock()
            .subscribers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it does NOT
/// unsubscribe; call [`Subscription::unsubscribe`] explicitly.
pub struct Subscription {
    state: Arc<Mutex<BusState>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let mut state = self.state.lock();
        if let Some(subs) = state.subscribers.get_mut(&self.kind) {
            subs.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn sentence(text: &str) -> StoryEvent {
        StoryEvent::SentenceComplete { text: text.into() }
    }

    fn text_of(event: &StoryEvent) -> String {
        match event {
            StoryEvent::SentenceComplete { text } => text.clone(),
            other => format!("{:?}", other.kind()),
        }
    }

    #[test]
    fn delivers_in_source_order_to_all_subscribers() {
        let bus = EventBus::new();
        let seen_a = Arc::new(PlMutex::new(Vec::new()));
        let seen_b = Arc::new(PlMutex::new(Vec::new()));

        let a = Arc::clone(&seen_a);
        let _sub_a = bus.subscribe(EventKind::SentenceComplete, move |e| {
            a.lock().push(text_of(e));
        });
        let b = Arc::clone(&seen_b);
        let _sub_b = bus.subscribe(EventKind::SentenceComplete, move |e| {
            b.lock().push(text_of(e));
        });

        bus.emit(sentence("one"));
        bus.emit(sentence("two"));

        assert_eq!(*seen_a.lock(), vec!["one", "two"]);
        assert_eq!(*seen_b.lock(), vec!["one", "two"]);
    }

    #[test]
    fn reentrant_emit_is_queued_after_current_dispatch() {
        let bus = EventBus::new();
        let order = Arc::new(PlMutex::new(Vec::new()));

        // First subscriber emits SaveComplete while "one" is being
        // delivered; the second subscriber must still see "one" before
        // anyone sees SaveComplete.
        let bus2 = bus.clone();
        let o = Arc::clone(&order);
        let _sub1 = bus.subscribe(EventKind::SentenceComplete, move |e| {
            o.lock().push(format!("first:{}", text_of(e)));
            bus2.emit(StoryEvent::SaveComplete);
        });
        let o = Arc::clone(&order);
        let _sub2 = bus.subscribe(EventKind::SentenceComplete, move |e| {
            o.lock().push(format!("second:{}", text_of(e)));
        });
        let o = Arc::clone(&order);
        let _sub3 = bus.subscribe(EventKind::SaveComplete, move |_| {
            o.lock().push("save".into());
        });

        bus.emit(sentence("one"));

        assert_eq!(
            *order.lock(),
            vec!["first:one".to_string(), "second:one".into(), "save".into()]
        );
    }

    #[test]
    fn panicking_handler_does_not_halt_delivery() {
        let bus = EventBus::new();
        let delivered = Arc::new(PlMutex::new(Vec::new()));
        let errors = Arc::new(PlMutex::new(0usize));

        let _bad = bus.subscribe(EventKind::SentenceComplete, |_| {
            panic!("subscriber bug");
        });
        let d = Arc::clone(&delivered);
        let _good = bus.subscribe(EventKind::SentenceComplete, move |e| {
            d.lock().push(text_of(e));
        });
        let errs = Arc::clone(&errors);
        let _err = bus.subscribe(EventKind::HandlerError, move |_| {
            *errs.lock() += 1;
        });

        bus.emit(sentence("still delivered"));

        assert_eq!(*delivered.lock(), vec!["still delivered"]);
        assert_eq!(*errors.lock(), 1);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let count = Arc::new(PlMutex::new(0usize));

        let c = Arc::clone(&count);
        let sub = bus.subscribe(EventKind::SaveComplete, move |_| {
            *c.lock() += 1;
        });
        bus.emit(StoryEvent::SaveComplete);
        sub.unsubscribe();
        bus.emit(StoryEvent::SaveComplete);

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.subscriber_count(EventKind::SaveComplete), 0);
    }

    #[test]
    fn ring_buffer_keeps_last_k_events() {
        let bus = EventBus::with_capacity(2);
        bus.emit(sentence("a"));
        bus.emit(sentence("b"));
        bus.emit(sentence("c"));

        let recent: Vec<String> = bus.recent().iter().map(text_of).collect();
        assert_eq!(recent, vec!["b", "c"]);
    }

    #[test]
    fn events_without_subscribers_are_dropped_quietly() {
        let bus = EventBus::new();
        bus.emit(sentence("nobody listening"));
        assert_eq!(bus.recent().len(), 1);
    }
}

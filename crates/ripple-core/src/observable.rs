//! Buffering and stateful observables.
//!
//! [`Observable`] decouples producers that start emitting before any consumer
//! exists: values emitted while no subscription has *ever* been registered
//! are parked in an ordered pending queue and replayed, in arrival order, to
//! the first subscriber. After that the queue is gone for good — emissions
//! deliver live, and a later gap with zero subscribers drops values rather
//! than buffering again.
//!
//! [`StatefulObservable`] instead retains only the most recent value. The
//! cache is overwritten on every emission, survives subscriber churn, and is
//! replayed to any subscriber that attaches while no other subscriber exists.
//!
//! Both share [`Observer`](crate::Observer)'s terminal-state semantics; see
//! the [`observer`](crate::observer) module docs for the locking and panic
//! policy.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use crate::error::StreamError;
use crate::handler::HandlerSet;
use crate::link::Link;
use crate::observer::{ObserverCore, Replay, StreamMetrics, StreamState, Subscribable};

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// A stream that buffers pre-subscription emissions and replays them, in
/// order, to its first subscriber.
///
/// ```rust,ignore
/// let o = Observable::new();
/// o.next(3);
/// o.next(2);
/// let _link = o.on(HandlerSet::new().next(|v| ...)); // receives 3, then 2
/// ```
pub struct Observable<T> {
    core: Arc<ObserverCore<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    /// Creates a new observable with an empty pending queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ObserverCore::new(Replay::Queue {
                pending: VecDeque::new(),
                subscribed: false,
            }),
        }
    }

    /// Creates an observable whose pending queue is seeded with `value`, as
    /// if `next(value)` had been called before any subscriber existed.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self {
            core: ObserverCore::new(Replay::Queue {
                pending: VecDeque::from([value]),
                subscribed: false,
            }),
        }
    }

    /// Emits a value: buffered while no subscription has ever been
    /// registered, delivered live otherwise. Accepted but inert on a
    /// terminal stream.
    pub fn next(&self, value: T) {
        self.core.emit_next(value);
    }

    /// Emits an error and transitions to [`StreamState::Errored`].
    ///
    /// Terminal signals are never buffered: the transition happens
    /// immediately even with zero subscribers, and it discards any pending
    /// values.
    pub fn error(&self, err: StreamError) {
        self.core.emit_error(err);
    }

    /// Emits the finish signal and transitions to
    /// [`StreamState::Finished`]. Like [`error`](Observable::error), never
    /// buffered.
    pub fn finish(&self) {
        self.core.emit_finish();
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.core.state()
    }

    /// Returns a counters snapshot.
    #[must_use]
    pub fn metrics(&self) -> StreamMetrics {
        self.core.metrics()
    }

    pub(crate) fn downgrade(&self) -> Weak<ObserverCore<T>> {
        Arc::downgrade(&self.core)
    }

    pub(crate) fn retain(&self, item: Box<dyn Any + Send>) {
        self.core.retain(item);
    }
}

impl<T: Clone + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> for Observable<T> {
    fn on(&self, handlers: HandlerSet<T>) -> Link {
        self.core.subscribe(handlers)
    }
}

// ---------------------------------------------------------------------------
// StatefulObservable
// ---------------------------------------------------------------------------

/// A stream that retains its most recent value.
///
/// The cache is overwritten on every emission and never cleared; a subscriber
/// attaching while no other subscriber exists receives it immediately.
pub struct StatefulObservable<T> {
    core: Arc<ObserverCore<T>>,
}

impl<T> Clone for StatefulObservable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + 'static> StatefulObservable<T> {
    /// Creates a new stateful observable with no cached value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ObserverCore::new(Replay::Latest(None)),
        }
    }

    /// Returns a clone of the cached last value, if any.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.core.latest()
    }

    /// Caches `value` and delivers it to current subscribers. The cache is
    /// updated even on a terminal stream; delivery is still suppressed.
    pub fn next(&self, value: T) {
        self.core.emit_next(value);
    }

    /// Emits an error and transitions to [`StreamState::Errored`].
    pub fn error(&self, err: StreamError) {
        self.core.emit_error(err);
    }

    /// Emits the finish signal and transitions to
    /// [`StreamState::Finished`].
    pub fn finish(&self) {
        self.core.emit_finish();
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.core.state()
    }

    /// Returns a counters snapshot.
    #[must_use]
    pub fn metrics(&self) -> StreamMetrics {
        self.core.metrics()
    }

    pub(crate) fn downgrade(&self) -> Weak<ObserverCore<T>> {
        Arc::downgrade(&self.core)
    }

    pub(crate) fn retain(&self, item: Box<dyn Any + Send>) {
        self.core.retain(item);
    }
}

impl<T: Clone + Send + 'static> Default for StatefulObservable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> for StatefulObservable<T> {
    fn on(&self, handlers: HandlerSet<T>) -> Link {
        self.core.subscribe(handlers)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::queue::DeliveryQueue;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn sink<T>() -> Arc<Mutex<Vec<T>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    // --- Observable: pre-subscription buffering ---

    #[test]
    fn test_observable_next_before_observe() {
        let o = Observable::<i32>::new();
        o.next(3);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));

        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_observable_next_after_observe() {
        let o = Observable::<i32>::new();
        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));

        o.next(3);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_observable_replays_in_order_exactly_once() {
        let o = Observable::<i32>::new();
        o.next(3);
        o.next(2);
        o.next(1);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let first = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1]);

        // Later live emissions follow the replayed ones.
        o.next(0);
        assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1, 0]);

        // A second subscriber gets live values only.
        let second_seen = sink();
        let tap = Arc::clone(&second_seen);
        let _second = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert!(second_seen.lock().unwrap().is_empty());

        drop(first);
    }

    #[test]
    fn test_observable_never_buffers_after_first_subscriber() {
        let o = Observable::<i32>::new();
        let link = o.on(HandlerSet::new().next(|_| {}));
        link.cancel();

        // Zero subscribers again, but the queue stays retired.
        o.next(3);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(o.metrics().values_buffered, 0);
    }

    #[test]
    fn test_observable_with_value_seeds_queue() {
        let o = Observable::with_value(3);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = o.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_observable_replay_honors_queue_binding() {
        let o = Observable::<i32>::new();
        o.next(1);
        o.next(2);

        let q = DeliveryQueue::new("replay").unwrap();
        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = o.on(
            HandlerSet::new()
                .next(move |v| tap.lock().unwrap().push(v))
                .via(&q),
        );

        // Replay is asynchronous for a queue-bound link.
        q.flush();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_observable_terminal_before_first_subscriber_discards_pending() {
        let o = Observable::<i32>::new();
        o.next(3);
        o.finish();

        let seen = sink();
        let tap = Arc::clone(&seen);
        let finished = Arc::new(Mutex::new(0u32));
        let fin = Arc::clone(&finished);
        let _link = o.on(
            HandlerSet::new()
                .next(move |v| tap.lock().unwrap().push(v))
                .finish(move || *fin.lock().unwrap() += 1),
        );

        // Terminal states suppress value delivery, replay included. The
        // finish signal itself was emitted with no handlers and is gone.
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(*finished.lock().unwrap(), 0);
        assert_eq!(o.state(), StreamState::Finished);
    }

    #[test]
    fn test_observable_error_is_terminal() {
        let o = Observable::<i32>::new();
        let errors = sink();
        let tap = Arc::clone(&errors);
        let _link = o.on(HandlerSet::new().error(move |e| tap.lock().unwrap().push(format!("{e}"))));

        o.error(Arc::new(Boom));
        o.error(Arc::new(Boom));
        o.next(3);

        assert_eq!(*errors.lock().unwrap(), vec!["boom"]);
        assert_eq!(o.metrics().values_suppressed, 1);
    }

    // --- StatefulObservable ---

    #[test]
    fn test_stateful_no_value_delivers_nothing_extra() {
        let s = StatefulObservable::<i32>::new();
        assert!(s.value().is_none());

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stateful_first_subscriber_gets_cached_value() {
        let s = StatefulObservable::<i32>::new();
        s.next(3);
        assert_eq!(s.value(), Some(3));

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _first = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert_eq!(*seen.lock().unwrap(), vec![3]);

        // A second subscriber attaching alongside the first gets nothing.
        let second_seen = sink();
        let tap = Arc::clone(&second_seen);
        let _second = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert!(second_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stateful_cache_overwritten_on_every_emission() {
        let s = StatefulObservable::<i32>::new();
        s.next(1);
        s.next(2);
        s.next(3);
        assert_eq!(s.value(), Some(3));
    }

    #[test]
    fn test_stateful_replays_after_gap() {
        let s = StatefulObservable::<i32>::new();
        s.next(7);

        let first = s.on(HandlerSet::new().next(|_| {}));
        first.cancel();

        // All subscribers gone; the cache survives the churn.
        let seen = sink();
        let tap = Arc::clone(&seen);
        let _second = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_stateful_cache_updates_even_when_terminal() {
        let s = StatefulObservable::<i32>::new();
        s.next(1);
        s.finish();
        s.next(2);

        // Emission tracked, delivery suppressed.
        assert_eq!(s.value(), Some(2));

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stateful_live_delivery_alongside_cache() {
        let s = StatefulObservable::<i32>::new();
        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = s.on(HandlerSet::new().next(move |v| tap.lock().unwrap().push(v)));

        s.next(1);
        s.next(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(s.value(), Some(2));
    }
}

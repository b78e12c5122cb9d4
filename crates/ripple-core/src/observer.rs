//! Observer — the base publish/subscribe unit.
//!
//! An [`Observer`] owns an insertion-ordered registry of links, a terminal
//! state flag, and the emission entry points ([`next`](Observer::next),
//! [`error`](Observer::error), [`finish`](Observer::finish)). Producers emit
//! on whichever thread they like; consumers attach handler sets via
//! [`Subscribable::on`].
//!
//! # State Machine
//!
//! ```text
//! Active --error()-->  Errored   (terminal)
//! Active --finish()--> Finished  (terminal)
//! ```
//!
//! No transition leaves a terminal state. Emissions on a terminal stream are
//! accepted but deliver nothing; re-invoking `error`/`finish` on a terminal
//! stream is a silent no-op.
//!
//! # Thread Safety
//!
//! Each stream instance owns its own `Mutex`; no lock spans multiple streams.
//! Emission snapshots the link list under the lock and invokes handlers after
//! releasing it, so handlers may subscribe, cancel, or emit on other streams
//! freely. A delivery racing a cancellation either completes or is skipped
//! (queue-bound deliveries re-check the link's cancellation flag at execution
//! time); it never crashes or double-delivers.
//!
//! # Panics
//!
//! All methods panic if the stream's internal `Mutex` has been poisoned
//! (i.e., a handler panicked while the lock was held). This should not occur
//! under normal operation.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use smallvec::SmallVec;

use crate::error::StreamError;
use crate::handler::{HandlerFns, HandlerSet};
use crate::link::{Link, LinkHost, LinkId};
use crate::queue::DeliveryQueue;

// ---------------------------------------------------------------------------
// StreamState
// ---------------------------------------------------------------------------

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting and delivering values.
    Active,
    /// The error signal was delivered; value delivery is permanently off.
    Errored,
    /// The finish signal was delivered; value delivery is permanently off.
    Finished,
}

// ---------------------------------------------------------------------------
// StreamMetrics
// ---------------------------------------------------------------------------

/// Point-in-time counters for one stream.
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    /// Live delivery rounds performed.
    pub values_emitted: u64,
    /// Values parked in the pending queue before the first subscriber.
    pub values_buffered: u64,
    /// Values suppressed by a terminal state.
    pub values_suppressed: u64,
    /// Links registered over the stream's lifetime.
    pub links_attached: u64,
    /// Links currently registered.
    pub active_links: usize,
    /// Current lifecycle state.
    pub state: StreamState,
}

/// Atomic counters backing [`StreamMetrics`].
#[derive(Debug, Default)]
struct CoreCounters {
    values_emitted: AtomicU64,
    values_buffered: AtomicU64,
    values_suppressed: AtomicU64,
    links_attached: AtomicU64,
}

// ---------------------------------------------------------------------------
// LinkEntry
// ---------------------------------------------------------------------------

/// One registered handler set as stored in a stream's registry.
pub(crate) struct LinkEntry<T> {
    id: LinkId,
    queue: Option<DeliveryQueue>,
    /// Shared with the [`Link`] handle; checked before every delivery.
    cancelled: Arc<AtomicBool>,
    handlers: Arc<HandlerFns<T>>,
}

impl<T> Clone for LinkEntry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            queue: self.queue.clone(),
            cancelled: Arc::clone(&self.cancelled),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<T: Send + 'static> LinkEntry<T> {
    fn deliver_next(&self, value: T) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        match &self.queue {
            None => {
                if let Some(f) = &self.handlers.next {
                    f(value);
                }
            }
            Some(queue) => {
                let handlers = Arc::clone(&self.handlers);
                let cancelled = Arc::clone(&self.cancelled);
                queue.enqueue(Box::new(move || {
                    if !cancelled.load(Ordering::Acquire) {
                        if let Some(f) = &handlers.next {
                            f(value);
                        }
                    }
                }));
            }
        }
    }

    fn deliver_error(&self, err: StreamError) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        match &self.queue {
            None => {
                if let Some(f) = &self.handlers.error {
                    f(err);
                }
            }
            Some(queue) => {
                let handlers = Arc::clone(&self.handlers);
                let cancelled = Arc::clone(&self.cancelled);
                queue.enqueue(Box::new(move || {
                    if !cancelled.load(Ordering::Acquire) {
                        if let Some(f) = &handlers.error {
                            f(err);
                        }
                    }
                }));
            }
        }
    }

    fn deliver_finish(&self) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        match &self.queue {
            None => {
                if let Some(f) = &self.handlers.finish {
                    f();
                }
            }
            Some(queue) => {
                let handlers = Arc::clone(&self.handlers);
                let cancelled = Arc::clone(&self.cancelled);
                queue.enqueue(Box::new(move || {
                    if !cancelled.load(Ordering::Acquire) {
                        if let Some(f) = &handlers.finish {
                            f();
                        }
                    }
                }));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ObserverCore
// ---------------------------------------------------------------------------

/// Replay behavior applied by a stream on emission and registration.
pub(crate) enum Replay<T> {
    /// Plain fan-out, no replay.
    None,
    /// Buffer values until the first-ever registration, then replay and
    /// deliver live forever after.
    Queue {
        pending: VecDeque<T>,
        subscribed: bool,
    },
    /// Cache the most recent value; replay it to a registration made while
    /// no other link exists.
    Latest(Option<T>),
}

struct CoreInner<T> {
    /// Registered links, in registration order.
    links: Vec<LinkEntry<T>>,
    state: StreamState,
    replay: Replay<T>,
    /// Objects whose lifetime is tied to this stream: upstream links of
    /// operator chains and worker shutdown guards.
    retained: Vec<Box<dyn Any + Send>>,
}

/// Shared core behind [`Observer`] and the observable types.
pub(crate) struct ObserverCore<T> {
    inner: Mutex<CoreInner<T>>,
    next_link_id: AtomicU64,
    counters: CoreCounters,
}

impl<T: Clone + Send + 'static> ObserverCore<T> {
    pub(crate) fn new(replay: Replay<T>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(CoreInner {
                links: Vec::new(),
                state: StreamState::Active,
                replay,
                retained: Vec::new(),
            }),
            next_link_id: AtomicU64::new(1),
            counters: CoreCounters::default(),
        })
    }

    /// Registers a handler set and returns its ownership handle.
    pub(crate) fn subscribe(self: &Arc<Self>, handlers: HandlerSet<T>) -> Link {
        let (fns, queue) = handlers.into_parts();
        let id = LinkId(self.next_link_id.fetch_add(1, Ordering::Relaxed));
        let cancelled = Arc::new(AtomicBool::new(false));
        let entry = LinkEntry {
            id,
            queue,
            cancelled: Arc::clone(&cancelled),
            handlers: Arc::new(fns),
        };

        {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            let was_empty = inner.links.is_empty();
            let active = inner.state == StreamState::Active;
            inner.links.push(entry.clone());
            self.counters.links_attached.fetch_add(1, Ordering::Relaxed);

            // Replay runs under the stream lock so it is ordered before any
            // live emission racing this registration. A handler must not emit
            // back into this same stream from inside replay.
            match &mut inner.replay {
                Replay::Queue {
                    pending,
                    subscribed,
                } if !*subscribed => {
                    *subscribed = true;
                    for value in std::mem::take(pending) {
                        entry.deliver_next(value);
                    }
                }
                Replay::Latest(Some(cached)) if was_empty && active => {
                    entry.deliver_next(cached.clone());
                }
                _ => {}
            }
        }

        Link::new(id, cancelled, Arc::clone(self) as Arc<dyn LinkHost>)
    }

    /// Delivers `value` to every registered next-handler in registration
    /// order, or buffers/suppresses it per the stream's replay mode and
    /// state.
    pub(crate) fn emit_next(&self, value: T) {
        let snapshot: SmallVec<[LinkEntry<T>; 4]> = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;

            // The latest-value cache tracks emissions even on terminal
            // streams; suppression applies to handler delivery only.
            if let Replay::Latest(slot) = &mut inner.replay {
                *slot = Some(value.clone());
            }

            if inner.state != StreamState::Active {
                self.counters
                    .values_suppressed
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }

            if let Replay::Queue {
                pending,
                subscribed,
            } = &mut inner.replay
            {
                if !*subscribed {
                    pending.push_back(value);
                    self.counters
                        .values_buffered
                        .fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }

            self.counters.values_emitted.fetch_add(1, Ordering::Relaxed);
            inner.links.iter().cloned().collect()
        };

        for entry in &snapshot {
            entry.deliver_next(value.clone());
        }
    }

    /// Delivers `err` to every error-handler, then the stream is Errored.
    /// No-op on an already terminal stream.
    pub(crate) fn emit_error(&self, err: StreamError) {
        let snapshot: SmallVec<[LinkEntry<T>; 4]> = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            if inner.state != StreamState::Active {
                return;
            }
            inner.state = StreamState::Errored;
            // Values buffered before the first subscriber are unreachable
            // now; terminal states suppress delivery, replay included.
            if let Replay::Queue { pending, .. } = &mut inner.replay {
                pending.clear();
            }
            inner.links.iter().cloned().collect()
        };

        for entry in &snapshot {
            entry.deliver_error(Arc::clone(&err));
        }
    }

    /// Delivers the finish signal to every finish-handler, then the stream is
    /// Finished. No-op on an already terminal stream.
    pub(crate) fn emit_finish(&self) {
        let snapshot: SmallVec<[LinkEntry<T>; 4]> = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            if inner.state != StreamState::Active {
                return;
            }
            inner.state = StreamState::Finished;
            if let Replay::Queue { pending, .. } = &mut inner.replay {
                pending.clear();
            }
            inner.links.iter().cloned().collect()
        };

        for entry in &snapshot {
            entry.deliver_finish();
        }
    }

    /// Ties `item`'s lifetime to this stream (upstream links, worker guards).
    pub(crate) fn retain(&self, item: Box<dyn Any + Send>) {
        self.inner.lock().unwrap().retained.push(item);
    }

    /// Returns a clone of the latest-value cache, if this stream keeps one.
    pub(crate) fn latest(&self) -> Option<T> {
        match &self.inner.lock().unwrap().replay {
            Replay::Latest(slot) => slot.clone(),
            _ => None,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.inner.lock().unwrap().state
    }

    pub(crate) fn metrics(&self) -> StreamMetrics {
        let inner = self.inner.lock().unwrap();
        StreamMetrics {
            values_emitted: self.counters.values_emitted.load(Ordering::Relaxed),
            values_buffered: self.counters.values_buffered.load(Ordering::Relaxed),
            values_suppressed: self.counters.values_suppressed.load(Ordering::Relaxed),
            links_attached: self.counters.links_attached.load(Ordering::Relaxed),
            active_links: inner.links.len(),
            state: inner.state,
        }
    }
}

impl<T: Send + 'static> LinkHost for ObserverCore<T> {
    fn unlink(&self, id: LinkId) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let before = guard.links.len();
        guard.links.retain(|entry| entry.id != id);
        before != guard.links.len()
    }
}

// ---------------------------------------------------------------------------
// Subscribable
// ---------------------------------------------------------------------------

/// An entity that can be subscribed to.
///
/// Implemented by [`Observer`], [`Observable`](crate::Observable), and
/// [`StatefulObservable`](crate::StatefulObservable). Object-safe so
/// heterogeneous sources can be combined through `&dyn Subscribable<T>`.
pub trait Subscribable<T: Clone + Send + 'static> {
    /// Registers a handler set; deliveries follow registration order across
    /// links. Returns the [`Link`] ownership handle.
    #[must_use = "dropping the returned link cancels the subscription"]
    fn on(&self, handlers: HandlerSet<T>) -> Link;
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// The base publish/subscribe unit: plain fan-out with no replay.
///
/// Cloning yields another handle to the same stream.
pub struct Observer<T> {
    core: Arc<ObserverCore<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + 'static> Observer<T> {
    /// Creates a new stream with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ObserverCore::new(Replay::None),
        }
    }

    /// Emits a value. Accepted but delivers nothing on a terminal stream.
    pub fn next(&self, value: T) {
        self.core.emit_next(value);
    }

    /// Emits an error and transitions to [`StreamState::Errored`]. No-op if
    /// the stream is already terminal.
    pub fn error(&self, err: StreamError) {
        self.core.emit_error(err);
    }

    /// Emits the finish signal and transitions to
    /// [`StreamState::Finished`]. No-op if the stream is already terminal.
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

impl<T: Clone + Send + 'static> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> for Observer<T> {
    fn on(&self, handlers: HandlerSet<T>) -> Link {
        self.core.subscribe(handlers)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

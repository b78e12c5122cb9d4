//! Derived stream operators.
//!
//! Every operator subscribes to an upstream source with an internal handler
//! and returns a new downstream stream, so operators chain indefinitely.
//! Upstream error/finish signals are forwarded verbatim, never altered.
//!
//! # Ownership
//!
//! Retention flows consumer → producer: the downstream stream holds the
//! upstream [`Link`](crate::Link), while the upstream handler holds only a
//! weak reference to the downstream core. Dropping every consumer handle
//! therefore unwinds the whole chain and deregisters from the source; no
//! explicit unsubscription is needed.
//!
//! # Buffering
//!
//! Operator outputs are [`Observable`]s: values an operator emits before any
//! consumer subscribes are replayed to the first subscriber, so a chain can
//! be assembled and fed before anyone listens.

use std::sync::Weak;
use std::time::Duration;

use crate::error::Error;
use crate::handler::HandlerSet;
use crate::link::Link;
use crate::observable::{Observable, StatefulObservable};
use crate::observer::{Observer, ObserverCore, Subscribable};
use crate::stream::EventStream;

mod accumulate;
mod adapter;
mod combine;
mod debounce;
mod trace;
mod transform;

/// Extends a [`HandlerSet`] with handlers forwarding upstream error/finish
/// signals verbatim to a downstream core.
pub(crate) fn forward_terminal<T, U>(
    set: HandlerSet<T>,
    down: &Weak<ObserverCore<U>>,
) -> HandlerSet<T>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
{
    let err_down = down.clone();
    let fin_down = down.clone();
    set.error(move |err| {
        if let Some(core) = err_down.upgrade() {
            core.emit_error(err);
        }
    })
    .finish(move || {
        if let Some(core) = fin_down.upgrade() {
            core.emit_finish();
        }
    })
}

// ---------------------------------------------------------------------------
// SubscribableExt
// ---------------------------------------------------------------------------

/// The operator algebra, available on every [`Subscribable`].
pub trait SubscribableExt<T: Clone + Send + 'static>: Subscribable<T> {
    /// Registers a next-handler only. Shorthand for
    /// `on(HandlerSet::new().next(f))`.
    #[must_use = "dropping the returned link cancels the subscription"]
    fn on_next<F>(&self, f: F) -> Link
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on(HandlerSet::new().next(f))
    }

    /// Emits `f(value)` for every upstream value.
    fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        transform::map(self, f)
    }

    /// Emits `f(value)` only when it yields `Some`; `None` results are
    /// dropped silently.
    fn compact_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        transform::compact_map(self, f)
    }

    /// Emits values unchanged when `predicate` holds.
    fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        transform::filter(self, predicate)
    }

    /// Drops exactly the first `count` values seen by this operator instance
    /// (not resettable), then passes everything through.
    fn skip(&self, count: u64) -> Observable<T> {
        transform::skip(self, count)
    }

    /// Sliding window: appends each value, trims the front to `limit`, and
    /// emits the full window (oldest-first) after every value — including
    /// during the initial fill phase.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    fn accumulate(&self, limit: usize) -> Observable<Vec<T>> {
        accumulate::accumulate(self, limit)
    }

    /// Combine-latest over two sources: every emission from either side
    /// updates its slot and emits a `(primary, other)` snapshot. A slot
    /// stays `None` until its source has emitted.
    fn combine<U, S>(&self, other: &S) -> Observable<(Option<T>, Option<U>)>
    where
        U: Clone + Send + 'static,
        S: Subscribable<U> + ?Sized,
    {
        combine::combine(self, other)
    }

    /// Combine-latest over same-typed sources: slot 0 is `self`, slots 1..
    /// follow `others` in order. Every emission from any source emits the
    /// full snapshot.
    fn combine_many(&self, others: &[&dyn Subscribable<T>]) -> Observable<Vec<Option<T>>>
    where
        Self: Sized,
    {
        combine::combine_many(self, others)
    }

    /// Coalesces bursts: each value replaces the pending delivery and is
    /// emitted downstream only after `delay` elapses with no newer value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnFailed`] if the timer worker thread cannot be
    /// spawned.
    fn debounce(&self, delay: Duration) -> Result<Observable<T>, Error> {
        debounce::debounce(self, delay)
    }

    /// Passthrough reporting every next/error/finish event to the `tracing`
    /// diagnostic sink at DEBUG level, optionally annotated with `tag`.
    fn debug(&self, tag: Option<&str>) -> Observable<T>
    where
        T: std::fmt::Debug,
    {
        trace::debug(self, tag)
    }

    /// Identity forwarding adapter with a non-owning upstream relation: once
    /// the returned [`Observer`] loses its last strong owner it is
    /// deallocated, its upstream registration is removed, and further
    /// upstream emissions become no-ops.
    fn observer(&self) -> Observer<T> {
        adapter::observer(self)
    }

    /// Adapter caching the upstream's most recent value in a
    /// [`StatefulObservable`].
    fn stateful(&self) -> StatefulObservable<T> {
        adapter::stateful(self)
    }

    /// Async adapter: an [`EventStream`] yielding this stream's events,
    /// terminating after the finish signal. Dropping the stream cancels the
    /// subscription.
    fn events(&self) -> EventStream<T> {
        crate::stream::events(self)
    }
}

impl<T: Clone + Send + 'static, S: Subscribable<T> + ?Sized> SubscribableExt<T> for S {}

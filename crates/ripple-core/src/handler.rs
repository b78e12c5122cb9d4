//! Handler sets — the per-subscription combination of callbacks.
//!
//! [`HandlerSet`] is the builder consumed by `on(...)`: any combination of
//! next/error/finish handlers, plus an optional [`DeliveryQueue`] binding via
//! [`via`](HandlerSet::via). Without a binding, handlers run synchronously on
//! the emitting thread; with one, each invocation is enqueued on that queue
//! (FIFO per queue, no cross-queue ordering).

use crate::error::StreamError;
use crate::queue::DeliveryQueue;

pub(crate) type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
pub(crate) type ErrorFn = Box<dyn Fn(StreamError) + Send + Sync>;
pub(crate) type FinishFn = Box<dyn Fn() + Send + Sync>;

/// The callbacks of one registration. Shared between the stream's registry
/// entry and any queued deliveries still in flight.
pub(crate) struct HandlerFns<T> {
    pub(crate) next: Option<NextFn<T>>,
    pub(crate) error: Option<ErrorFn>,
    pub(crate) finish: Option<FinishFn>,
}

impl<T> Default for HandlerFns<T> {
    fn default() -> Self {
        Self {
            next: None,
            error: None,
            finish: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HandlerSet
// ---------------------------------------------------------------------------

/// Builder for the handler combination registered by `on(...)`.
///
/// ```rust,ignore
/// stream.on(
///     HandlerSet::new()
///         .next(|v| println!("{v}"))
///         .error(|e| eprintln!("{e}"))
///         .finish(|| println!("done"))
///         .via(&queue),
/// );
/// ```
pub struct HandlerSet<T> {
    fns: HandlerFns<T>,
    queue: Option<DeliveryQueue>,
}

impl<T> HandlerSet<T> {
    /// Creates an empty handler set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fns: HandlerFns::default(),
            queue: None,
        }
    }

    /// Sets the next-handler, invoked for every delivered value.
    #[must_use]
    pub fn next<F>(mut self, f: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.fns.next = Some(Box::new(f));
        self
    }

    /// Sets the error-handler, invoked once if the stream errors.
    #[must_use]
    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(StreamError) + Send + Sync + 'static,
    {
        self.fns.error = Some(Box::new(f));
        self
    }

    /// Sets the finish-handler, invoked once if the stream finishes.
    #[must_use]
    pub fn finish<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.fns.finish = Some(Box::new(f));
        self
    }

    /// Binds this registration's deliveries to `queue`.
    #[must_use]
    pub fn via(mut self, queue: &DeliveryQueue) -> Self {
        self.queue = Some(queue.clone());
        self
    }

    pub(crate) fn into_parts(self) -> (HandlerFns<T>, Option<DeliveryQueue>) {
        (self.fns, self.queue)
    }
}

impl<T> Default for HandlerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_set_collects_parts() {
        let set = HandlerSet::<u32>::new()
            .next(|_| {})
            .error(|_| {})
            .finish(|| {});
        let (fns, queue) = set.into_parts();
        assert!(fns.next.is_some());
        assert!(fns.error.is_some());
        assert!(fns.finish.is_some());
        assert!(queue.is_none());
    }

    #[test]
    fn test_handler_set_queue_binding() {
        let q = DeliveryQueue::new("bind").unwrap();
        let set = HandlerSet::<u32>::new().next(|_| {}).via(&q);
        let (_, queue) = set.into_parts();
        assert_eq!(queue.unwrap().label(), "bind");
    }

    #[test]
    fn test_handler_set_empty_is_valid() {
        let (fns, queue) = HandlerSet::<u32>::default().into_parts();
        assert!(fns.next.is_none());
        assert!(fns.error.is_none());
        assert!(fns.finish.is_none());
        assert!(queue.is_none());
    }
}

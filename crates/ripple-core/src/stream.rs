//! Async `Stream` adapter over a subscription.
//!
//! Wraps a subscription in a `tokio_stream`-compatible async stream, enabling
//! idiomatic consumption with combinators like `.filter()`, `.map()`, and
//! `.take()`:
//!
//! ```rust,ignore
//! use tokio_stream::StreamExt;
//!
//! let mut stream = source.events();
//! while let Some(event) = stream.next().await {
//!     match event {
//!         StreamEvent::Next(v) => process(v),
//!         StreamEvent::Error(e) => eprintln!("{e}"),
//!     }
//! }
//! ```
//!
//! # Implementation Note
//!
//! Handlers push into an unbounded tokio mpsc channel and the stream wraps
//! [`UnboundedReceiverStream`], which integrates with tokio's wakeup
//! machinery — the task is only woken when data is actually available. The
//! finish signal is an in-band marker that terminates the stream; dropping
//! the stream drops its [`Link`] and thereby cancels the subscription.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use crate::error::StreamError;
use crate::handler::HandlerSet;
use crate::link::Link;
use crate::observer::Subscribable;

// ---------------------------------------------------------------------------
// StreamEvent
// ---------------------------------------------------------------------------

/// One event yielded by an [`EventStream`].
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    /// A delivered value.
    Next(T),
    /// The stream's error signal. The next poll yields `None`.
    Error(StreamError),
}

/// In-band message between the subscription handlers and the stream.
enum Msg<T> {
    Next(T),
    Error(StreamError),
    Finish,
}

// ---------------------------------------------------------------------------
// EventStream
// ---------------------------------------------------------------------------

/// Async stream over a subscription's events.
///
/// Terminates (`None`) after the finish or error signal. Dropping the stream
/// cancels the underlying subscription.
pub struct EventStream<T> {
    inner: UnboundedReceiverStream<Msg<T>>,
    link: Link,
    terminated: bool,
}

impl<T> EventStream<T> {
    /// Cancels the subscription and terminates the stream.
    pub fn cancel(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.link.cancel();
        }
    }

    /// Returns `true` once the stream has terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Returns the underlying subscription link.
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }
}

impl<T> Stream for EventStream<T> {
    type Item = StreamEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // All fields are Unpin, so get_mut is safe.
        let this = self.get_mut();

        if this.terminated {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Msg::Next(value))) => Poll::Ready(Some(StreamEvent::Next(value))),
            Poll::Ready(Some(Msg::Error(err))) => {
                this.terminated = true;
                Poll::Ready(Some(StreamEvent::Error(err)))
            }
            Poll::Ready(Some(Msg::Finish)) | Poll::Ready(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Subscribes to `src` and returns the adapter stream.
pub(crate) fn events<T, S>(src: &S) -> EventStream<T>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    let (tx, rx) = mpsc::unbounded_channel::<Msg<T>>();

    let next_tx = tx.clone();
    let err_tx = tx.clone();
    let fin_tx = tx;
    let link = src.on(
        HandlerSet::new()
            .next(move |value| {
                let _ = next_tx.send(Msg::Next(value));
            })
            .error(move |err| {
                let _ = err_tx.send(Msg::Error(err));
            })
            .finish(move || {
                let _ = fin_tx.send(Msg::Finish);
            }),
    );

    EventStream {
        inner: UnboundedReceiverStream::new(rx),
        link,
        terminated: false,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

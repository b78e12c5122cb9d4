//! Delivery queues — named FIFO executors for asynchronous handler dispatch.
//!
//! A [`DeliveryQueue`] owns a dedicated worker thread draining boxed jobs from
//! an mpsc channel. Links bound to a queue (via
//! [`HandlerSet::via`](crate::HandlerSet::via)) have their handler invocations
//! enqueued here instead of running on the emitting thread.
//!
//! # Ordering
//!
//! Jobs on one queue run strictly in enqueue order (FIFO). No ordering is
//! guaranteed across different queues, nor between a queue and synchronous
//! (queue-less) deliveries.
//!
//! # Panic Safety
//!
//! A panicking handler is caught with [`std::panic::catch_unwind`] and
//! reported via `tracing::error!`; the worker keeps draining subsequent jobs.
//!
//! # Lifecycle
//!
//! The handle is cheaply cloneable. When the last handle drops, the channel
//! closes; the worker finishes any outstanding jobs and exits. There is no
//! explicit shutdown call.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::error::Error;

/// A unit of work dispatched to a queue worker.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

// ---------------------------------------------------------------------------
// DeliveryQueue
// ---------------------------------------------------------------------------

/// A named FIFO execution queue backed by a dedicated worker thread.
///
/// ```rust,ignore
/// let queue = DeliveryQueue::new("ui")?;
/// let link = stream.on(HandlerSet::new().next(|v| render(v)).via(&queue));
/// ```
#[derive(Clone)]
pub struct DeliveryQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    label: String,
    tx: mpsc::Sender<Job>,
}

impl DeliveryQueue {
    /// Creates a queue and spawns its worker thread (named `queue-{label}`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnFailed`] if the OS refuses to spawn the worker.
    pub fn new(label: impl Into<String>) -> Result<Self, Error> {
        let label = label.into();
        let (tx, rx) = mpsc::channel::<Job>();

        let thread_name = format!("queue-{label}");
        let worker_label = label.clone();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || queue_worker(&worker_label, &rx))
            .map_err(|e| Error::SpawnFailed {
                name: thread_name,
                message: e.to_string(),
            })?;

        Ok(Self {
            shared: Arc::new(QueueShared { label, tx }),
        })
    }

    /// Returns the queue label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Enqueues a job for execution on the worker thread.
    ///
    /// The send only fails if the worker is gone, which cannot happen while a
    /// handle exists; a failure is logged rather than surfaced.
    pub(crate) fn enqueue(&self, job: Job) {
        if self.shared.tx.send(job).is_err() {
            tracing::error!(queue = %self.shared.label, "delivery queue worker is gone, dropping job");
        }
    }

    /// Blocks until every job enqueued before this call has run.
    ///
    /// Useful for tests and for producers that need a delivery barrier.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel::<()>();
        self.enqueue(Box::new(move || {
            let _ = tx.send(());
        }));
        let _ = rx.recv();
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("label", &self.shared.label)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Drains jobs until all senders are gone. Panics in jobs are isolated.
fn queue_worker(label: &str, rx: &mpsc::Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(move || job())).is_err() {
            tracing::error!(queue = %label, "handler panicked on delivery queue");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_queue_label() {
        let q = DeliveryQueue::new("events").unwrap();
        assert_eq!(q.label(), "events");
    }

    #[test]
    fn test_queue_fifo_order() {
        let q = DeliveryQueue::new("fifo").unwrap();
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100u32 {
            let seen = Arc::clone(&seen);
            q.enqueue(Box::new(move || {
                seen.lock().unwrap().push(i);
            }));
        }
        q.flush();

        let seen = seen.lock().unwrap();
        let expected: Vec<u32> = (0..100).collect();
        assert_eq!(*seen, expected);
    }

    #[test]
    fn test_queue_flush_is_a_barrier() {
        let q = DeliveryQueue::new("barrier").unwrap();
        let done = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&done);
        q.enqueue(Box::new(move || {
            // Simulate a slow handler.
            thread::sleep(std::time::Duration::from_millis(20));
            *flag.lock().unwrap() = true;
        }));

        q.flush();
        assert!(*done.lock().unwrap());
    }

    #[test]
    fn test_queue_survives_panicking_job() {
        let q = DeliveryQueue::new("panicky").unwrap();
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        q.enqueue(Box::new(|| panic!("deliberate test panic")));

        let after = Arc::clone(&seen);
        q.enqueue(Box::new(move || {
            after.lock().unwrap().push("after");
        }));
        q.flush();

        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_queue_clone_shares_worker() {
        let q = DeliveryQueue::new("shared").unwrap();
        let q2 = q.clone();
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        q.enqueue(Box::new(move || a.lock().unwrap().push(1)));
        let b = Arc::clone(&seen);
        q2.enqueue(Box::new(move || b.lock().unwrap().push(2)));
        q.flush();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}

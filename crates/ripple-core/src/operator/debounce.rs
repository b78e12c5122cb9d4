//! Debounce — coalesces bursts into the last value after a quiet period.
//!
//! Each debounce instance owns a dedicated timer worker thread parked on a
//! condvar. An incoming value replaces the pending `(value, deadline)` entry
//! and wakes the worker; the worker delivers a value downstream only if it is
//! still the pending one when its deadline passes. Replacement and delivery
//! both happen under the state lock, so a stale schedule is never delivered.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::handler::HandlerSet;
use crate::observable::Observable;
use crate::observer::{ObserverCore, Subscribable};

use super::forward_terminal;

struct Pending<T> {
    value: T,
    deadline: Instant,
}

struct DebounceState<T> {
    pending: Option<Pending<T>>,
    shutdown: bool,
}

struct DebounceShared<T> {
    state: Mutex<DebounceState<T>>,
    wakeup: Condvar,
}

/// Stops the timer worker when the downstream observable is dropped.
struct ShutdownGuard<T: Send + 'static> {
    shared: Arc<DebounceShared<T>>,
}

impl<T: Send + 'static> Drop for ShutdownGuard<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.shutdown = true;
        state.pending = None;
        self.shared.wakeup.notify_all();
    }
}

pub(crate) fn debounce<T, S>(src: &S, delay: Duration) -> Result<Observable<T>, Error>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();

    let shared = Arc::new(DebounceShared {
        state: Mutex::new(DebounceState {
            pending: None,
            shutdown: false,
        }),
        wakeup: Condvar::new(),
    });

    let worker_shared = Arc::clone(&shared);
    let worker_down = down.clone();
    thread::Builder::new()
        .name("ripple-debounce".into())
        .spawn(move || timer_worker(&worker_shared, &worker_down))
        .map_err(|e| Error::SpawnFailed {
            name: "ripple-debounce".into(),
            message: e.to_string(),
        })?;

    let next_shared = Arc::clone(&shared);
    let handlers = HandlerSet::new().next(move |value: T| {
        let mut state = next_shared.state.lock().unwrap();
        // Replaces any pending schedule; the stale one is never delivered.
        state.pending = Some(Pending {
            value,
            deadline: Instant::now() + delay,
        });
        next_shared.wakeup.notify_one();
    });
    let handlers = forward_terminal(handlers, &down);

    out.retain(Box::new(src.on(handlers)));
    out.retain(Box::new(ShutdownGuard { shared }));
    Ok(out)
}

fn timer_worker<T: Clone + Send + 'static>(
    shared: &DebounceShared<T>,
    down: &Weak<ObserverCore<T>>,
) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if state.shutdown {
            break;
        }

        let Some(deadline) = state.pending.as_ref().map(|p| p.deadline) else {
            state = shared.wakeup.wait(state).unwrap();
            continue;
        };

        let now = Instant::now();
        if now < deadline {
            let (guard, _timed_out) = shared.wakeup.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            continue;
        }

        // Due. Taking the entry under the lock means a racing replacement or
        // shutdown always wins over a stale fire.
        let fired = state.pending.take();
        drop(state);
        if let Some(pending) = fired {
            if let Some(core) = down.upgrade() {
                core.emit_next(pending.value);
            }
        }
        state = shared.state.lock().unwrap();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

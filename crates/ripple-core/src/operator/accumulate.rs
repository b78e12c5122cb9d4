//! Sliding-window accumulation.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::handler::HandlerSet;
use crate::observable::Observable;
use crate::observer::Subscribable;

use super::forward_terminal;

pub(crate) fn accumulate<T, S>(src: &S, limit: usize) -> Observable<Vec<T>>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    assert!(limit > 0, "accumulate window limit must be positive");

    let out = Observable::new();
    let down = out.downgrade();

    let window: Mutex<VecDeque<T>> = Mutex::new(VecDeque::with_capacity(limit));
    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
        let mut window = window.lock().unwrap();
        window.push_back(value);
        while window.len() > limit {
            window.pop_front();
        }
        // Snapshot and emit under the window lock so interleaved updates
        // cannot reorder the emitted windows.
        let snapshot: Vec<T> = window.iter().cloned().collect();
        if let Some(core) = next_down.upgrade() {
            core.emit_next(snapshot);
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

// ===========================================================================
// Tests
// ===========================================================================

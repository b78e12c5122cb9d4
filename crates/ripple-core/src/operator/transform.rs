//! Stateless and counter-based transforms: map, compact-map, filter, skip.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::handler::HandlerSet;
use crate::observable::Observable;
use crate::observer::Subscribable;

use super::forward_terminal;

pub(crate) fn map<T, U, F, S>(src: &S, f: F) -> Observable<U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();

    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value| {
        if let Some(core) = next_down.upgrade() {
            core.emit_next(f(value));
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

pub(crate) fn compact_map<T, U, F, S>(src: &S, f: F) -> Observable<U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();

    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value| {
        if let Some(mapped) = f(value) {
            if let Some(core) = next_down.upgrade() {
                core.emit_next(mapped);
            }
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

pub(crate) fn filter<T, P, S>(src: &S, predicate: P) -> Observable<T>
where
    T: Clone + Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();

    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
        if predicate(&value) {
            if let Some(core) = next_down.upgrade() {
                core.emit_next(value);
            }
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

pub(crate) fn skip<T, S>(src: &S, count: u64) -> Observable<T>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();

    let seen = AtomicU64::new(0);
    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
        // fetch_add hands out one slot per value, so exactly `count` are
        // dropped even under concurrent emission.
        if seen.fetch_add(1, Ordering::Relaxed) < count {
            return;
        }
        if let Some(core) = next_down.upgrade() {
            core.emit_next(value);
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::handler::HandlerSet;
    use crate::observable::Observable;
    use crate::observer::Subscribable;
    use crate::operator::SubscribableExt;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn sink<T>() -> Arc<Mutex<Vec<T>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_map_transforms_values() {
        let o = Observable::<i32>::new();
        let p = o.map(|v| v.to_string());

        o.next(3);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec!["3".to_string()]);
    }

    #[test]
    fn test_compact_map_drops_none() {
        let o = Observable::<i32>::new();
        let p = o.compact_map(|v| (v % 2 == 0).then(|| v.to_string()));

        o.next(3);
        o.next(2);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec!["2".to_string()]);
    }

    #[test]
    fn test_filter_passes_matching_values() {
        let o = Observable::<i32>::new();
        let p = o.filter(|v| v % 2 == 0);

        o.next(3);
        o.next(2);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_skip_drops_exactly_n() {
        let o = Observable::<i32>::new();
        let p = o.skip(2);

        o.next(3);
        o.next(2);
        o.next(1);
        o.next(0);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_operators_chain() {
        let o = Observable::<i32>::new();
        let p = o.map(|v| v * 10).filter(|v| *v >= 20);

        o.next(1);
        o.next(2);
        o.next(3);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec![20, 30]);
    }

    #[test]
    fn test_map_forwards_error_verbatim() {
        let o = Observable::<i32>::new();
        let p = o.map(|v| v * 2);

        let errors = sink();
        let tap = Arc::clone(&errors);
        let _link = p.on(HandlerSet::new().error(move |e| tap.lock().unwrap().push(format!("{e}"))));

        o.error(Arc::new(Boom));
        o.next(3);

        assert_eq!(*errors.lock().unwrap(), vec!["boom"]);
        // The terminal state propagated: downstream delivers no values.
        let seen = sink();
        let tap = Arc::clone(&seen);
        let _values = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_map_forwards_finish_verbatim() {
        let o = Observable::<i32>::new();
        let p = o.map(|v| v * 2);

        let finished = Arc::new(Mutex::new(false));
        let tap = Arc::clone(&finished);
        let _link = p.on(HandlerSet::new().finish(move || *tap.lock().unwrap() = true));

        o.finish();
        assert!(*finished.lock().unwrap());
    }

    #[test]
    fn test_dropping_operator_output_deregisters_upstream() {
        let o = Observable::<i32>::new();
        let _first = o.on_next(|_| {});
        assert_eq!(o.metrics().active_links, 1);

        let p = o.map(|v| v * 2);
        assert_eq!(o.metrics().active_links, 2);

        drop(p);
        assert_eq!(o.metrics().active_links, 1);
    }
}

//! Forwarding adapters: the weakly-held identity observer and the stateful
//! cache adapter.

use crate::handler::HandlerSet;
use crate::observable::StatefulObservable;
use crate::observer::{Observer, Subscribable};

use super::forward_terminal;

/// Identity adapter. The upstream holds only the weak delivery reference to
/// the returned observer; the adapter's own upstream link is its sole tie
/// back, removed by the link's destruction hook when the adapter's last
/// strong owner is gone.
pub(crate) fn observer<T, S>(src: &S) -> Observer<T>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observer::new();
    let down = out.downgrade();

    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
        if let Some(core) = next_down.upgrade() {
            core.emit_next(value);
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(src.on(handlers)));
    out
}

/// Caches the upstream's most recent value in a [`StatefulObservable`].
pub(crate) fn stateful<T, S>(src: &S) -> StatefulObservable<T>
where
    T: Clone + Send + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = StatefulObservable::new();
    let down = out.downgrade();

    let next_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
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

    use crate::link::LinkBag;
    use crate::observable::Observable;
    use crate::operator::SubscribableExt;

    fn sink<T>() -> Arc<Mutex<Vec<T>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_observer_adapter_forwards_live_values() {
        let o = Observable::<i32>::new();
        let p = o.observer();

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));

        o.next(3);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_observer_adapter_dies_with_its_bag() {
        let o = Observable::<i32>::new();
        let bag = LinkBag::new();

        // The bag's link is the adapter's only strong owner: the link keeps
        // the adapter core alive, the adapter keeps the upstream link.
        o.observer()
            .on_next(|_| panic!("this subscription should be gone"))
            .add_to(&bag);
        assert_eq!(o.metrics().active_links, 1);

        bag.clear();
        o.next(3);

        // The adapter deallocated and deregistered from the upstream.
        assert_eq!(o.metrics().active_links, 0);
    }

    #[test]
    fn test_stateful_adapter_caches_latest() {
        let o = Observable::<i32>::new();
        let p = o.stateful();

        assert!(p.value().is_none());

        o.next(3);

        let _a = p.on_next(|_| {});
        let _b = p.on_next(|_| {});

        assert_eq!(p.value(), Some(3));
    }

    #[test]
    fn test_stateful_adapter_replays_to_first_subscriber() {
        let o = Observable::<i32>::new();
        let p = o.stateful();

        o.next(7);

        let seen = sink();
        let tap = Arc::clone(&seen);
        let _link = p.on_next(move |v| tap.lock().unwrap().push(v));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }
}

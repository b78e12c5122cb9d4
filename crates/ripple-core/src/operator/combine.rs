//! Combine-latest operators, 2-ary and N-ary.

use std::sync::{Arc, Mutex};

use crate::handler::HandlerSet;
use crate::observable::Observable;
use crate::observer::Subscribable;

use super::forward_terminal;

pub(crate) fn combine<T, U, S1, S2>(primary: &S1, other: &S2) -> Observable<(Option<T>, Option<U>)>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    S1: Subscribable<T> + ?Sized,
    S2: Subscribable<U> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();
    let slots = Arc::new(Mutex::new((None::<T>, None::<U>)));

    let primary_slots = Arc::clone(&slots);
    let primary_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: T| {
        let mut slots = primary_slots.lock().unwrap();
        slots.0 = Some(value);
        // Snapshot and emit under the slot lock so interleaved updates
        // cannot reorder snapshots.
        if let Some(core) = primary_down.upgrade() {
            core.emit_next(slots.clone());
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(primary.on(handlers)));

    let other_slots = Arc::clone(&slots);
    let other_down = down.clone();
    let handlers = HandlerSet::new().next(move |value: U| {
        let mut slots = other_slots.lock().unwrap();
        slots.1 = Some(value);
        if let Some(core) = other_down.upgrade() {
            core.emit_next(slots.clone());
        }
    });
    let handlers = forward_terminal(handlers, &down);
    out.retain(Box::new(other.on(handlers)));

    out
}

pub(crate) fn combine_many<T>(
    primary: &dyn Subscribable<T>,
    others: &[&dyn Subscribable<T>],
) -> Observable<Vec<Option<T>>>
where
    T: Clone + Send + 'static,
{
    let out = Observable::new();
    let down = out.downgrade();
    let slots = Arc::new(Mutex::new(vec![None::<T>; others.len() + 1]));

    for (index, source) in std::iter::once(primary)
        .chain(others.iter().copied())
        .enumerate()
    {
        let slot_store = Arc::clone(&slots);
        let slot_down = down.clone();
        let handlers = HandlerSet::new().next(move |value: T| {
            let mut slots = slot_store.lock().unwrap();
            slots[index] = Some(value);
            if let Some(core) = slot_down.upgrade() {
                core.emit_next(slots.clone());
            }
        });
        let handlers = forward_terminal(handlers, &down);
        out.retain(Box::new(source.on(handlers)));
    }

    out
}

// ===========================================================================
// Tests
// ===========================================================================

//! Diagnostic passthrough reporting events to the `tracing` sink.

use std::sync::Arc;

use crate::handler::HandlerSet;
use crate::observable::Observable;
use crate::observer::Subscribable;

pub(crate) fn debug<T, S>(src: &S, tag: Option<&str>) -> Observable<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
    S: Subscribable<T> + ?Sized,
{
    let out = Observable::new();
    let down = out.downgrade();
    let tag: Arc<str> = Arc::from(tag.unwrap_or_default());

    let next_tag = Arc::clone(&tag);
    let next_down = down.clone();
    let err_tag = Arc::clone(&tag);
    let err_down = down.clone();
    let fin_tag = tag;
    let fin_down = down;

    let handlers = HandlerSet::new()
        .next(move |value: T| {
            tracing::debug!(tag = %next_tag, value = ?value, "next");
            if let Some(core) = next_down.upgrade() {
                core.emit_next(value);
            }
        })
        .error(move |err| {
            tracing::debug!(tag = %err_tag, error = %err, "error");
            if let Some(core) = err_down.upgrade() {
                core.emit_error(err);
            }
        })
        .finish(move || {
            tracing::debug!(tag = %fin_tag, "finish");
            if let Some(core) = fin_down.upgrade() {
                core.emit_finish();
            }
        });

    out.retain(Box::new(src.on(handlers)));
    out
}

// ===========================================================================
// Tests
// ===========================================================================

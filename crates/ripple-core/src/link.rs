//! Links and link bags — subscription identity and lifetime management.
//!
//! A [`Link`] is the ownership handle returned by `on(...)`: one registered
//! handler set bound to a stream. The handle is cloneable (shared ownership);
//! the registration is removed when the link is explicitly
//! [cancelled](Link::cancel) or when the *last* strong handle drops. A live
//! link also keeps its owning stream — and therefore the operator chain
//! upstream of it — alive.
//!
//! A [`LinkBag`] bounds subscription lifetime by composition: it is a
//! container of link handles whose [`clear`](LinkBag::clear) releases them
//! all. Dropping the bag behaves like an implicit `clear`.
//!
//! # Thread Safety
//!
//! Cancellation may race an in-flight emission: the delivery either completes
//! or is skipped (queued deliveries re-check the cancellation flag at
//! execution time), never crashes or double-delivers.
//!
//! # Panics
//!
//! `LinkBag` methods panic if its internal `Mutex` has been poisoned (a
//! thread panicked while holding the lock). This should not occur under
//! normal operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// LinkId
// ---------------------------------------------------------------------------

/// Unique link identifier, monotonically assigned per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LinkHost
// ---------------------------------------------------------------------------

/// Deregistration seam implemented by every stream core.
///
/// Holding the host through an `Arc<dyn LinkHost>` is what extends the owning
/// stream's lifetime to that of its longest-lived link handle.
pub(crate) trait LinkHost: Send + Sync {
    /// Removes the registration for `id`. Returns `true` if it was present.
    fn unlink(&self, id: LinkId) -> bool;
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// Shared state behind every clone of one [`Link`].
struct LinkShared {
    id: LinkId,
    /// Shared with the stream's registry entry; checked before delivery.
    cancelled: Arc<AtomicBool>,
    host: Arc<dyn LinkHost>,
}

impl LinkShared {
    fn cancel(&self) {
        // First caller wins; the flag also makes queued deliveries skip.
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.host.unlink(self.id);
        }
    }
}

impl Drop for LinkShared {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Ownership handle for one registered handler set.
///
/// Returned by `on(...)`. Clones share ownership: the registration stays
/// active until every clone is gone or [`cancel`](Link::cancel) is called.
#[must_use = "dropping the last handle cancels the subscription"]
#[derive(Clone)]
pub struct Link {
    shared: Arc<LinkShared>,
}

impl Link {
    pub(crate) fn new(id: LinkId, cancelled: Arc<AtomicBool>, host: Arc<dyn LinkHost>) -> Self {
        Self {
            shared: Arc::new(LinkShared {
                id,
                cancelled,
                host,
            }),
        }
    }

    /// Returns the link identifier.
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.shared.id
    }

    /// Cancels the registration. Idempotent; affects every clone.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Returns `true` once the link has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Moves this handle into `bag`, tying the registration's lifetime to it.
    pub fn add_to(self, bag: &LinkBag) {
        bag.add(self);
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.shared.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LinkBag
// ---------------------------------------------------------------------------

/// An ownership container bounding subscription lifetime.
///
/// While the bag is alive, every link it holds remains active.
/// [`clear`](LinkBag::clear) releases all held handles; a link whose only
/// strong owner was the bag is cancelled at that moment. Clearing is
/// idempotent and the bag accepts further [`add`](LinkBag::add) calls
/// afterwards. Dropping the bag is an implicit `clear`.
#[derive(Default)]
pub struct LinkBag {
    links: Mutex<Vec<Link>>,
}

impl LinkBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a strong handle to `link`.
    pub fn add(&self, link: Link) {
        self.links.lock().unwrap().push(link);
    }

    /// Releases every held handle.
    ///
    /// Handles are dropped outside the bag lock, so deregistration (which
    /// takes per-stream locks) never nests inside it.
    pub fn clear(&self) {
        let drained: Vec<Link> = {
            let mut links = self.links.lock().unwrap();
            links.drain(..).collect()
        };
        drop(drained);
    }

    /// Returns the number of held links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Returns `true` if the bag holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.lock().unwrap().is_empty()
    }
}

impl std::fmt::Debug for LinkBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkBag").field("len", &self.len()).finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

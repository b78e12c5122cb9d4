//! # Ripple Core
//!
//! A reactive event-stream core: a minimal publish/subscribe primitive plus
//! an algebra of derived streams and deterministic subscription lifetime
//! management.
//!
//! This crate provides:
//! - **Observer**: the base fan-out unit with terminal-state tracking
//! - **Observable / StatefulObservable**: pre-subscription buffering and
//!   latest-value caching
//! - **Operators**: map, filter, accumulate, combine-latest, debounce, and
//!   friends — each a stream wired to an upstream source
//! - **Link / LinkBag**: ownership handles bounding subscription lifetime
//! - **Delivery queues**: named FIFO executors for asynchronous dispatch
//!
//! ## Design Principles
//!
//! 1. **Synchronous by default** — emission runs on the caller's thread
//!    unless a link opts into a delivery queue
//! 2. **Per-stream locking** — each stream owns its synchronization; no lock
//!    spans multiple streams
//! 3. **Retention flows consumer → producer** — dropping every consumer
//!    handle unwinds an operator chain and deregisters from the source
//! 4. **Terminal states are final** — after `error`/`finish`, value delivery
//!    stops permanently
//!
//! ## Example
//!
//! ```rust,ignore
//! use ripple_core::{HandlerSet, LinkBag, Observable, SubscribableExt};
//!
//! let bag = LinkBag::new();
//! let temps = Observable::new();
//!
//! temps
//!     .filter(|t: &i32| *t > 0)
//!     .accumulate(3)
//!     .on(HandlerSet::new().next(|window| println!("{window:?}")))
//!     .add_to(&bag);
//!
//! temps.next(21);
//! bag.clear(); // cancels the whole chain
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)] // Lock methods panic only on poisoned Mutex

pub mod error;
pub mod handler;
pub mod link;
pub mod observable;
pub mod observer;
pub mod operator;
pub mod queue;
pub mod stream;

// Re-export key types
pub use error::{Error, StreamError};
pub use handler::HandlerSet;
pub use link::{Link, LinkBag, LinkId};
pub use observable::{Observable, StatefulObservable};
pub use observer::{Observer, StreamMetrics, StreamState, Subscribable};
pub use operator::SubscribableExt;
pub use queue::DeliveryQueue;
pub use stream::{EventStream, StreamEvent};

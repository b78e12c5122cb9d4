//! Error types for the event-stream core.
//!
//! Two kinds of failure exist and they are kept strictly apart:
//!
//! - [`StreamError`] is the payload of a stream's *error channel* — an
//!   arbitrary caller-supplied error, opaque to the core, wrapped in an `Arc`
//!   so a single emission can fan out to any number of error handlers without
//!   copying.
//! - [`Error`] covers failures of the delivery machinery itself (currently
//!   only worker-thread spawn failures). These never travel through a stream.

use std::sync::Arc;

/// Opaque error payload carried on a stream's error channel.
///
/// The core never inspects the payload; it only clones the `Arc` to deliver
/// the same error to every registered error handler.
pub type StreamError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the delivery machinery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dedicated worker thread could not be spawned.
    #[error("failed to spawn {name} worker thread: {message}")]
    SpawnFailed {
        /// Name the worker thread would have carried.
        name: String,
        /// Underlying OS error message.
        message: String,
    },
}

// ===========================================================================
// Tests
// ===========================================================================

//! Errors surfaced by the event loop and its workers.

use core_types::ContextError;
use thiserror::Error;

/// Error returned by a callback executed on the loop thread.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by [`Loop`](crate::Loop) and [`Worker`](crate::Worker)
/// operations.
///
/// Nothing in the loop retries; each failure is reported once and the caller
/// decides what to do with it.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The governing context ended before or while the operation could
    /// complete
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The worker's one-shot finalization was already consumed
    #[error("repeated submit")]
    RepeatedSubmit,
    /// The loop the worker belongs to has been dropped
    #[error("event loop closed")]
    Closed,
    /// `run` was entered while another thread was already draining the loop
    #[error("event loop is already running")]
    AlreadyRunning,
    /// The OS refused to start a job thread
    #[error("failed to spawn job thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// A callback failed on the loop thread; `run` stops at the first failure
    #[error("callback failed: {0}")]
    Callback(#[source] CallbackError),
}

impl LoopError {
    /// The context error behind this failure, if any.
    pub fn context(&self) -> Option<ContextError> {
        match self {
            LoopError::Context(err) => Some(*err),
            _ => None,
        }
    }

    /// Returns true if the failure was caused by an explicit cancellation.
    pub fn is_canceled(&self) -> bool {
        self.context() == Some(ContextError::Canceled)
    }
}

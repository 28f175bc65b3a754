//! Errors raised when a cancellation scope ends.

use thiserror::Error;

/// Why a [`Context`](crate::Context) ended.
///
/// Operations that block under a context fail with this error once the
/// context is done.
///
/// # Examples
///
/// ```
/// use core_types::{Context, ContextError};
///
/// let ctx = Context::new();
/// ctx.cancel();
/// assert_eq!(ctx.err(), Some(ContextError::Canceled));
/// assert_eq!(ContextError::Canceled.to_string(), "context canceled");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// The context, or one of its ancestors, was cancelled explicitly
    #[error("context canceled")]
    Canceled,
    /// The context's deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextError {
    /// Returns true for [`ContextError::DeadlineExceeded`].
    pub fn is_deadline(&self) -> bool {
        matches!(self, ContextError::DeadlineExceeded)
    }
}

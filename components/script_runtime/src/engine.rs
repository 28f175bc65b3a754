//! The interpreter seam.
//!
//! The runtime never interprets anything itself; it asks a [`ScriptEngine`]
//! to invoke the callbacks scripts registered with the timer functions.

use thiserror::Error;

use crate::timers::{TimerHandle, Timers};

/// A single-threaded interpreter embedded in a [`Runtime`](crate::Runtime).
///
/// The engine lives in the loop state, so it is only ever touched by the
/// thread driving the loop. Its functions therefore need not be `Send`.
pub trait ScriptEngine: Sized + 'static {
    /// A callable script value, as passed to `set_timeout`/`set_interval`
    type Function: 'static;

    /// Error raised by a failing script callback
    type Error: std::error::Error + Send + Sync + 'static;

    /// Invokes `function` with the handle of the timer that fired.
    ///
    /// `timers` gives the callback the script timer surface, so it may set
    /// or clear timers (including its own) while it runs.
    fn call(
        &mut self,
        function: &mut Self::Function,
        handle: TimerHandle,
        timers: &mut Timers<Self>,
    ) -> Result<(), Self::Error>;
}

/// A host closure standing in for a script function
pub type NativeFunction =
    Box<dyn FnMut(TimerHandle, &mut Timers<NativeEngine>) -> Result<(), NativeError>>;

/// Error raised by a [`NativeFunction`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NativeError(pub String);

impl NativeError {
    /// Creates an error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An engine whose functions are Rust closures.
///
/// Drives timers without a script language: host-side timers, the CLI and
/// tests.
#[derive(Debug, Default)]
pub struct NativeEngine {
    calls: u64,
}

impl NativeEngine {
    /// Create a new engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks invoked so far
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl ScriptEngine for NativeEngine {
    type Function = NativeFunction;
    type Error = NativeError;

    fn call(
        &mut self,
        function: &mut NativeFunction,
        handle: TimerHandle,
        timers: &mut Timers<Self>,
    ) -> Result<(), NativeError> {
        self.calls += 1;
        function(handle, timers)
    }
}

/// Boxes a closure into the optional callback `set_timeout`/`set_interval`
/// accept.
pub fn native<F>(f: F) -> Option<NativeFunction>
where
    F: FnMut(TimerHandle, &mut Timers<NativeEngine>) -> Result<(), NativeError> + 'static,
{
    Some(Box::new(f))
}

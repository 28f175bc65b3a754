//! Error types for the runtime and the CLI

use async_runtime::LoopError;
use core_types::ContextError;
use thiserror::Error;

use crate::timers::TimerId;

/// Errors returned by [`Runtime`](crate::Runtime) and [`Timers`](crate::Timers)
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime was built with timers turned off
    #[error("timers are disabled for this runtime")]
    TimersDisabled,

    /// A timer reached a runtime other than the one that set it, which
    /// happens when runtimes share a loop
    #[error("timer {0} belongs to another runtime")]
    ForeignTimer(TimerId),

    /// The event loop refused or aborted the operation
    #[error(transparent)]
    Loop(#[from] LoopError),
}

impl RuntimeError {
    /// Returns the context error if the runtime was cancelled or timed out
    pub fn context(&self) -> Option<ContextError> {
        match self {
            RuntimeError::Loop(err) => err.context(),
            RuntimeError::TimersDisabled | RuntimeError::ForeignTimer(_) => None,
        }
    }
}

impl From<ContextError> for RuntimeError {
    fn from(err: ContextError) -> Self {
        RuntimeError::Loop(err.into())
    }
}

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// A timer could not be scheduled or the loop failed
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Malformed `--interval` argument
    #[error("invalid interval '{0}', expected <MS>x<COUNT>")]
    InvalidInterval(String),

    /// The report could not be serialized
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

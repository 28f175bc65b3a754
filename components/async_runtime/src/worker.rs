//! Per-job handles used by background jobs to report back to the loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use core_types::{Context, ContextError};
use crossbeam::channel::Sender;
use crossbeam::select;
use tracing::trace;

use crate::event_loop::{Callback, Handoff};
use crate::LoopError;

/// The only way a background job may affect loop state.
///
/// A worker delivers callbacks to the loop thread; the loop executes them
/// with exclusive access to its state. A job calls [`next`](Worker::next) any
/// number of times for intermediate results, then [`submit`](Worker::submit)
/// exactly once to finalize.
pub trait Worker<S>: Send {
    /// Delivers the final callback of this job and marks the job complete.
    ///
    /// Fails with [`LoopError::RepeatedSubmit`] if the job was already
    /// finalized. If the worker's context ends before the loop receives the
    /// message, the context error is returned and the job still counts as
    /// finalized.
    fn submit(&self, callback: Option<Callback<S>>) -> Result<(), LoopError>;

    /// Delivers an intermediate callback without finalizing the job.
    ///
    /// Fails with [`LoopError::RepeatedSubmit`] once the job is finalized.
    fn next(&self, callback: Option<Callback<S>>) -> Result<(), LoopError>;

    /// Returns true once [`submit`](Worker::submit) has been called.
    fn is_finalized(&self) -> bool;

    /// The context the job was scheduled under.
    fn context(&self) -> &Context;
}

/// Worker handed out by [`SimpleLoop`](crate::SimpleLoop).
pub struct LoopWorker<S> {
    job: u64,
    finalized: AtomicBool,
    ctx: Context,
    sender: Sender<Handoff<S>>,
}

impl<S> LoopWorker<S> {
    pub(crate) fn new(job: u64, ctx: Context, sender: Sender<Handoff<S>>) -> Self {
        Self {
            job,
            finalized: AtomicBool::new(false),
            ctx,
            sender,
        }
    }

    /// Blocks until the loop takes the message or the context ends.
    fn deliver(&self, handoff: Handoff<S>) -> Result<(), LoopError> {
        if let Some(err) = self.ctx.err() {
            return Err(err.into());
        }
        let last = handoff.last;
        select! {
            send(self.sender, handoff) -> sent => match sent {
                Ok(()) => {
                    trace!(job = self.job, last, "handoff delivered");
                    Ok(())
                }
                Err(_) => Err(LoopError::Closed),
            },
            recv(self.ctx.done()) -> _ => {
                Err(self.ctx.err().unwrap_or(ContextError::Canceled).into())
            }
        }
    }
}

impl<S: 'static> Worker<S> for LoopWorker<S> {
    fn submit(&self, callback: Option<Callback<S>>) -> Result<(), LoopError> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(LoopError::RepeatedSubmit);
        }
        self.deliver(Handoff {
            callback,
            last: true,
        })
    }

    fn next(&self, callback: Option<Callback<S>>) -> Result<(), LoopError> {
        if self.finalized.load(Ordering::Acquire) {
            return Err(LoopError::RepeatedSubmit);
        }
        self.deliver(Handoff {
            callback,
            last: false,
        })
    }

    fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    fn context(&self) -> &Context {
        &self.ctx
    }
}

impl<S> fmt::Debug for LoopWorker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopWorker")
            .field("job", &self.job)
            .field("finalized", &self.finalized.load(Ordering::Relaxed))
            .finish()
    }
}

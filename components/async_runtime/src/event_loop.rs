//! Event loop implementation.
//!
//! This module provides the single-consumer loop that serializes all callback
//! execution against the embedded interpreter. Background jobs run on their
//! own threads and hand callbacks back through a rendezvous channel; only the
//! thread inside [`Loop::run`] ever executes them.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use core_types::{Context, ContextError};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, trace, warn};

use crate::worker::{LoopWorker, Worker};
use crate::{CallbackError, LoopConfig, LoopError};

/// Result of a callback executed on the loop thread.
pub type CallbackResult = Result<(), CallbackError>;

/// A callback delivered by a worker and executed by [`Loop::run`] with
/// exclusive access to the loop state.
pub type Callback<S> = Box<dyn FnOnce(&mut S) -> CallbackResult + Send>;

/// A background job. It runs on its own thread and owns its worker.
pub type Job<S> = Box<dyn FnOnce(Box<dyn Worker<S>>) + Send>;

/// A loop shared between the embedding runtime and its bindings.
pub type SharedLoop<S> = Arc<dyn Loop<S>>;

/// Boxes a closure into the optional callback accepted by
/// [`Worker::submit`] and [`Worker::next`].
pub fn callback<S, F>(f: F) -> Option<Callback<S>>
where
    S: 'static,
    F: FnOnce(&mut S) -> CallbackResult + Send + 'static,
{
    Some(Box::new(f))
}

/// One message on the handoff channel.
pub(crate) struct Handoff<S> {
    pub(crate) callback: Option<Callback<S>>,
    /// Set by `submit`; the job is complete once this message is consumed
    pub(crate) last: bool,
}

/// The scheduler that owns all access to the loop state `S`.
///
/// Implementations must run every callback on the thread that called
/// [`run`](Loop::run), one at a time, in the order the callbacks arrived.
pub trait Loop<S: 'static>: Send + Sync {
    /// Starts `job` in the background.
    ///
    /// Fails without scheduling anything if `ctx` has already ended. Never
    /// blocks, and may be called from any thread, including from a callback
    /// currently executing inside [`run`](Loop::run).
    fn go(&self, ctx: &Context, job: Job<S>) -> Result<(), LoopError>;

    /// Executes delivered callbacks until every scheduled job has finalized.
    ///
    /// Returns the context error as soon as `ctx` ends; jobs still pending at
    /// that point are abandoned.
    fn run(&self, ctx: &Context, state: &mut S) -> Result<(), LoopError>;
}

/// The default [`Loop`]: one thread per job, one rendezvous channel, one
/// pending-job counter.
///
/// # Examples
///
/// ```
/// use async_runtime::{callback, Loop, SimpleLoop};
/// use core_types::Context;
///
/// let event_loop = SimpleLoop::new();
/// let ctx = Context::new();
///
/// for i in 0..3 {
///     event_loop
///         .go(&ctx, Box::new(move |worker| {
///             let _ = worker.submit(callback(move |sum: &mut u32| {
///                 *sum += i;
///                 Ok(())
///             }));
///         }))
///         .unwrap();
/// }
///
/// let mut sum = 0;
/// event_loop.run(&ctx, &mut sum).unwrap();
/// assert_eq!(sum, 3);
/// ```
pub struct SimpleLoop<S> {
    sender: Sender<Handoff<S>>,
    receiver: Receiver<Handoff<S>>,
    pending: AtomicUsize,
    next_job: AtomicU64,
    running: AtomicBool,
    config: LoopConfig,
}

impl<S: 'static> SimpleLoop<S> {
    /// Creates a loop with the default configuration.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates a loop whose job threads follow `config`.
    pub fn with_config(config: LoopConfig) -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            sender,
            receiver,
            pending: AtomicUsize::new(0),
            next_job: AtomicU64::new(1),
            running: AtomicBool::new(false),
            config,
        }
    }

    /// Wraps a new loop for sharing with bindings.
    pub fn shared(config: LoopConfig) -> SharedLoop<S> {
        Arc::new(Self::with_config(config))
    }

    /// Number of scheduled jobs that have not finalized yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn dispatch(&self, handoff: Handoff<S>, state: &mut S) -> Result<(), LoopError> {
        let Handoff { callback, last } = handoff;
        trace!(last, "executing handoff");
        let result = match callback {
            Some(f) => f(state),
            None => Ok(()),
        };
        if last {
            let left = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
            debug!(pending = left, "job finalized");
        }
        result.map_err(LoopError::Callback)
    }

    fn abandon(&self, err: ContextError) -> LoopError {
        let pending = self.pending();
        if pending > 0 {
            warn!(pending, %err, "event loop stopped with pending jobs");
        }
        err.into()
    }
}

impl<S: 'static> Loop<S> for SimpleLoop<S> {
    fn go(&self, ctx: &Context, job: Job<S>) -> Result<(), LoopError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let id = self.next_job.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::AcqRel);
        let worker = LoopWorker::new(id, ctx.clone(), self.sender.clone());

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name, id));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        match builder.spawn(move || job(Box::new(worker))) {
            Ok(_) => {
                debug!(job = id, "job scheduled");
                Ok(())
            }
            Err(err) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(LoopError::Spawn(err))
            }
        }
    }

    fn run(&self, ctx: &Context, state: &mut S) -> Result<(), LoopError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(LoopError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        debug!(pending = self.pending(), "event loop started");
        loop {
            if self.pending() == 0 {
                debug!("event loop drained");
                return Ok(());
            }
            if let Some(err) = ctx.err() {
                return Err(self.abandon(err));
            }
            select! {
                // picked up by the check at the top of the loop
                recv(ctx.done()) -> _ => {}
                recv(self.receiver) -> handoff => {
                    // the loop holds a sender, so the channel cannot disconnect
                    if let Ok(handoff) = handoff {
                        if let Some(err) = ctx.err() {
                            return Err(self.abandon(err));
                        }
                        self.dispatch(handoff, state)?;
                    }
                }
            }
        }
    }
}

/// Clears the running flag when `run` returns, whichever way it returns.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: 'static> Default for SimpleLoop<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SimpleLoop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleLoop")
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish()
    }
}

//! Runtime orchestration for script execution
//!
//! The Runtime ties together:
//! - the script engine, held in the loop state
//! - the event loop that serializes every callback onto one thread
//! - the runtime context that cancels all of its background work
//! - the script timer surface

use std::fmt;
use std::sync::Arc;

use async_runtime::{Job, LoopConfig, SharedLoop, SimpleLoop};
use core_types::Context;
use tracing::debug;

use crate::engine::ScriptEngine;
use crate::error::RuntimeError;
use crate::timers::{Host, Timers};

/// Options accepted by [`Runtime::with_options`]
pub struct RuntimeOptions<E: ScriptEngine> {
    /// Whether scripts may set timers
    pub timers: bool,
    /// Thread settings for the default loop; ignored when a loop is supplied
    pub loop_config: LoopConfig,
    /// Parent context; cancelling it cancels the runtime
    pub context: Option<Context>,
    /// Loop to run on instead of a fresh [`SimpleLoop`]
    pub event_loop: Option<SharedLoop<Host<E>>>,
}

impl<E: ScriptEngine> RuntimeOptions<E> {
    /// Create the default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the timer functions
    pub fn with_timers(mut self, enabled: bool) -> Self {
        self.timers = enabled;
        self
    }

    /// Set the thread settings of the default loop
    pub fn with_loop_config(mut self, config: LoopConfig) -> Self {
        self.loop_config = config;
        self
    }

    /// Derive the runtime context from `ctx`
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Run on an existing loop
    pub fn with_loop(mut self, event_loop: SharedLoop<Host<E>>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }
}

impl<E: ScriptEngine> Default for RuntimeOptions<E> {
    fn default() -> Self {
        Self {
            timers: true,
            loop_config: LoopConfig::default(),
            context: None,
            event_loop: None,
        }
    }
}

/// Main runtime embedding a script engine on an event loop
pub struct Runtime<E: ScriptEngine> {
    /// Child of the parent context, owned by this runtime
    ctx: Context,
    /// Loop every background job reports back to
    event_loop: SharedLoop<Host<E>>,
    /// Loop state: engine and timer registry
    host: Host<E>,
}

impl<E: ScriptEngine> Runtime<E> {
    /// Create a runtime with default options
    ///
    /// # Example
    /// ```
    /// use script_runtime::{NativeEngine, Runtime};
    ///
    /// let mut runtime = Runtime::new(NativeEngine::new());
    /// runtime.run_loop().unwrap();
    /// ```
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, RuntimeOptions::default())
    }

    /// Create a runtime from `options`
    pub fn with_options(engine: E, options: RuntimeOptions<E>) -> Self {
        let ctx = match &options.context {
            Some(parent) => parent.child(),
            None => Context::new(),
        };
        let event_loop = match options.event_loop {
            Some(event_loop) => event_loop,
            None => SimpleLoop::shared(options.loop_config),
        };
        let timers = Timers::new(Arc::clone(&event_loop), ctx.clone(), options.timers);
        debug!(timers = options.timers, "runtime created");
        Self {
            ctx,
            event_loop,
            host: Host { engine, timers },
        }
    }

    /// Schedule a background job under the runtime context
    ///
    /// # Errors
    /// Fails if the runtime has been cancelled
    pub fn go(&self, job: Job<Host<E>>) -> Result<(), RuntimeError> {
        self.event_loop.go(&self.ctx, job)?;
        Ok(())
    }

    /// Drive the loop until every job and timer has finalized
    ///
    /// # Errors
    /// Returns the context error if the runtime is cancelled first, or the
    /// error of a failing callback
    pub fn run_loop(&mut self) -> Result<(), RuntimeError> {
        let result = self.event_loop.run(&self.ctx, &mut self.host);
        debug!(ok = result.is_ok(), "runtime loop finished");
        result.map_err(RuntimeError::from)
    }

    /// Cancel the runtime context. The parent context is unaffected.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// The runtime context; clone it to cancel or schedule from other threads
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The loop this runtime runs on
    pub fn get_loop(&self) -> SharedLoop<Host<E>> {
        Arc::clone(&self.event_loop)
    }

    /// The script timer surface
    pub fn timers(&self) -> &Timers<E> {
        &self.host.timers
    }

    /// Mutable access to the script timer surface
    pub fn timers_mut(&mut self) -> &mut Timers<E> {
        &mut self.host.timers
    }

    /// The embedded engine
    pub fn engine(&self) -> &E {
        &self.host.engine
    }

    /// Mutable access to the embedded engine
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.host.engine
    }
}

impl<E: ScriptEngine> Drop for Runtime<E> {
    fn drop(&mut self) {
        // releases timer waiters and jobs still parked on the context
        self.ctx.cancel();
    }
}

impl<E: ScriptEngine> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("ctx", &self.ctx)
            .field("host", &self.host)
            .finish()
    }
}

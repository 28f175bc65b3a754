//! Script-facing timers.
//!
//! Script callbacks never leave the loop thread. They are kept in a registry
//! inside the loop state, keyed by [`TimerId`]; the background waiters only
//! carry the id and the timer's cancellation signal.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_runtime::timer::{schedule_interval, schedule_timeout};
use async_runtime::{CallbackResult, SharedLoop};
use core_types::Context;
use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::ScriptEngine;
use crate::RuntimeError;

/// Identifies a timer within one runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    /// The raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by [`Timers::set_timeout`]
#[derive(Debug, Clone)]
pub struct Timeout {
    id: TimerId,
    signal: Context,
    /// Context of the runtime that set the timer
    owner: Context,
}

impl Timeout {
    /// Timer id
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Returns true once the timeout has been cleared
    pub fn is_cleared(&self) -> bool {
        self.signal.is_done()
    }
}

/// Handle returned by [`Timers::set_interval`]
#[derive(Debug, Clone)]
pub struct Interval {
    id: TimerId,
    signal: Context,
    /// Context of the runtime that set the timer
    owner: Context,
}

impl Interval {
    /// Timer id
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Returns true once the interval has been cleared
    pub fn is_cleared(&self) -> bool {
        self.signal.is_done()
    }
}

/// The timer a callback is invoked for; passed to the callback as its
/// argument.
#[derive(Debug, Clone)]
pub enum TimerHandle {
    /// A one-shot timer
    Timeout(Timeout),
    /// A repeating timer
    Interval(Interval),
}

impl TimerHandle {
    /// Timer id
    pub fn id(&self) -> TimerId {
        match self {
            TimerHandle::Timeout(t) => t.id,
            TimerHandle::Interval(i) => i.id,
        }
    }

    /// Returns true once the timer has been cleared
    pub fn is_cleared(&self) -> bool {
        self.signal().is_done()
    }

    fn signal(&self) -> &Context {
        match self {
            TimerHandle::Timeout(t) => &t.signal,
            TimerHandle::Interval(i) => &i.signal,
        }
    }

    fn owner(&self) -> &Context {
        match self {
            TimerHandle::Timeout(t) => &t.owner,
            TimerHandle::Interval(i) => &i.owner,
        }
    }
}

/// The loop state of a [`Runtime`](crate::Runtime): the engine plus the
/// timer registry. Only callbacks running inside the loop can reach it.
pub struct Host<E: ScriptEngine> {
    /// The embedded interpreter
    pub engine: E,
    /// Script timer surface and callback registry
    pub timers: Timers<E>,
}

impl<E: ScriptEngine> Host<E> {
    /// Runs the script callback registered for `handle`, if any.
    ///
    /// Ids are only unique per runtime, so a timer set by another runtime
    /// sharing the loop is rejected instead of looked up.
    fn fire(&mut self, handle: TimerHandle) -> CallbackResult {
        let id = handle.id();
        if !handle.owner().same_scope(&self.timers.ctx) {
            warn!(%id, "timer delivered to a runtime that did not set it");
            return Err(RuntimeError::ForeignTimer(id).into());
        }
        let mut function = match self.timers.callbacks.remove(&id) {
            Some(function) => function,
            None => {
                debug!(%id, "timer fired without a callback");
                return Ok(());
            }
        };
        debug!(%id, "timer fired");

        let repeats = matches!(handle, TimerHandle::Interval(_));
        let signal = handle.signal().clone();
        let result = self.engine.call(&mut function, handle, &mut self.timers);
        // the callback may have cleared its own interval
        if repeats && !signal.is_done() {
            self.timers.callbacks.insert(id, function);
        }
        result.map_err(Into::into)
    }
}

impl<E: ScriptEngine> fmt::Debug for Host<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("timers", &self.timers).finish()
    }
}

/// `set_timeout`, `clear_timeout`, `set_interval` and `clear_interval`.
pub struct Timers<E: ScriptEngine> {
    event_loop: SharedLoop<Host<E>>,
    ctx: Context,
    enabled: bool,
    next_id: u64,
    callbacks: HashMap<TimerId, E::Function>,
}

impl<E: ScriptEngine> Timers<E> {
    pub(crate) fn new(event_loop: SharedLoop<Host<E>>, ctx: Context, enabled: bool) -> Self {
        Self {
            event_loop,
            ctx,
            enabled,
            next_id: 1,
            callbacks: HashMap::new(),
        }
    }

    /// Whether the runtime was built with timers
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of timers that still hold a script callback
    pub fn registered(&self) -> usize {
        self.callbacks.len()
    }

    /// Calls `callback` once, after `delay_ms` milliseconds.
    ///
    /// Negative delays count as zero. A missing callback is allowed; the
    /// timer still runs and finalizes.
    pub fn set_timeout(
        &mut self,
        callback: Option<E::Function>,
        delay_ms: i64,
    ) -> Result<Timeout, RuntimeError> {
        self.check_enabled()?;
        let timeout = Timeout {
            id: self.allocate(),
            signal: Context::new(),
            owner: self.ctx.clone(),
        };
        let handle = TimerHandle::Timeout(timeout.clone());
        schedule_timeout(
            &*self.event_loop,
            &self.ctx,
            &timeout.signal,
            delay(delay_ms),
            move |host: &mut Host<E>| host.fire(handle),
        )?;
        if let Some(function) = callback {
            self.callbacks.insert(timeout.id, function);
        }
        debug!(id = %timeout.id, delay_ms, "timeout set");
        Ok(timeout)
    }

    /// Cancels a timeout. Clearing twice, or after it fired, does nothing.
    pub fn clear_timeout(&mut self, timeout: &Timeout) {
        self.release(timeout.id, &timeout.signal, &timeout.owner);
    }

    /// Calls `callback` every `delay_ms` milliseconds until cleared.
    ///
    /// Negative delays count as zero; the period never drops below
    /// [`MIN_INTERVAL`](async_runtime::timer::MIN_INTERVAL).
    pub fn set_interval(
        &mut self,
        callback: Option<E::Function>,
        delay_ms: i64,
    ) -> Result<Interval, RuntimeError> {
        self.check_enabled()?;
        let interval = Interval {
            id: self.allocate(),
            signal: Context::new(),
            owner: self.ctx.clone(),
        };
        let handle = interval.clone();
        schedule_interval(
            &*self.event_loop,
            &self.ctx,
            &interval.signal,
            delay(delay_ms),
            move |host: &mut Host<E>| host.fire(TimerHandle::Interval(handle.clone())),
        )?;
        if let Some(function) = callback {
            self.callbacks.insert(interval.id, function);
        }
        debug!(id = %interval.id, delay_ms, "interval set");
        Ok(interval)
    }

    /// Stops an interval. Clearing twice does nothing.
    pub fn clear_interval(&mut self, interval: &Interval) {
        self.release(interval.id, &interval.signal, &interval.owner);
    }

    /// Clears either kind of timer
    pub fn clear(&mut self, handle: &TimerHandle) {
        match handle {
            TimerHandle::Timeout(t) => self.clear_timeout(t),
            TimerHandle::Interval(i) => self.clear_interval(i),
        }
    }

    fn check_enabled(&self) -> Result<(), RuntimeError> {
        if self.enabled {
            Ok(())
        } else {
            Err(RuntimeError::TimersDisabled)
        }
    }

    fn allocate(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn release(&mut self, id: TimerId, signal: &Context, owner: &Context) {
        // another runtime's id may name one of our own timers
        if owner.same_scope(&self.ctx) {
            self.callbacks.remove(&id);
        }
        if !signal.is_done() {
            debug!(%id, "timer cleared");
        }
        signal.cancel();
    }
}

impl<E: ScriptEngine> fmt::Debug for Timers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("enabled", &self.enabled)
            .field("next_id", &self.next_id)
            .field("registered", &self.callbacks.len())
            .finish()
    }
}

/// Converts a script delay to a duration, clamping negatives to zero.
fn delay(delay_ms: i64) -> Duration {
    Duration::from_millis(delay_ms.max(0) as u64)
}

//! One-shot and repeating timers driven by the event loop.
//!
//! Each timer is a background job racing three events: the governing context
//! ending, the timer's own cancellation signal, and its delay elapsing. The
//! callbacks it delivers re-check the signal on the loop thread, so a timer
//! cancelled from inside another callback never fires afterwards, even if its
//! message was already in flight.

use std::sync::Arc;
use std::time::Duration;

use core_types::Context;
use crossbeam::channel;
use crossbeam::select;
use tracing::{debug, trace};

use crate::event_loop::{Callback, CallbackResult};
use crate::{Loop, LoopError};

/// Shortest period an interval ticks at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What woke a timer job up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Elapsed,
    Cancelled,
    RuntimeCancelled,
}

/// Schedules `on_fire` to run on the loop thread once `delay` has elapsed.
///
/// Firing `signal` before that cancels the timer. Whether the timer fires or
/// is cancelled (through `signal` or `ctx`), its job is finalized exactly
/// once.
pub fn schedule_timeout<S, F>(
    event_loop: &dyn Loop<S>,
    ctx: &Context,
    signal: &Context,
    delay: Duration,
    on_fire: F,
) -> Result<(), LoopError>
where
    S: 'static,
    F: FnOnce(&mut S) -> CallbackResult + Send + 'static,
{
    let runtime = ctx.clone();
    let signal = signal.clone();
    event_loop.go(
        ctx,
        Box::new(move |worker| {
            let timer = channel::after(delay);
            let wake = select! {
                recv(runtime.done()) -> _ => Wake::RuntimeCancelled,
                recv(signal.done()) -> _ => Wake::Cancelled,
                recv(timer) -> _ => Wake::Elapsed,
            };
            drop(timer);
            debug!(?wake, ?delay, "timeout woke");

            let callback: Option<Callback<S>> = match wake {
                Wake::Elapsed => Some(Box::new(move |state: &mut S| {
                    if signal.is_done() {
                        return Ok(());
                    }
                    on_fire(state)
                })),
                Wake::Cancelled | Wake::RuntimeCancelled => None,
            };
            if let Err(err) = worker.submit(callback) {
                trace!(%err, "timeout finalization not delivered");
            }
        }),
    )
}

/// Schedules `on_tick` to run on the loop thread every `period` until
/// `signal` or `ctx` ends.
///
/// Ticks are delivered with [`Worker::next`](crate::Worker::next); the job is finalized once, when
/// the interval is cancelled. If a tick cannot be delivered because the loop
/// has gone away, the job exits without finalizing. Periods shorter than
/// [`MIN_INTERVAL`] are raised to it.
pub fn schedule_interval<S, F>(
    event_loop: &dyn Loop<S>,
    ctx: &Context,
    signal: &Context,
    period: Duration,
    on_tick: F,
) -> Result<(), LoopError>
where
    S: 'static,
    F: Fn(&mut S) -> CallbackResult + Send + Sync + 'static,
{
    let runtime = ctx.clone();
    let signal = signal.clone();
    let on_tick = Arc::new(on_tick);
    let period = period.max(MIN_INTERVAL);
    event_loop.go(
        ctx,
        Box::new(move |worker| {
            let ticker = channel::tick(period);
            let mut ticks: u64 = 0;
            let wake = loop {
                let wake = select! {
                    recv(runtime.done()) -> _ => Wake::RuntimeCancelled,
                    recv(signal.done()) -> _ => Wake::Cancelled,
                    recv(ticker) -> _ => Wake::Elapsed,
                };
                if wake != Wake::Elapsed {
                    break wake;
                }

                ticks += 1;
                let on_tick = Arc::clone(&on_tick);
                let gate = signal.clone();
                let tick: Callback<S> = Box::new(move |state: &mut S| {
                    if gate.is_done() {
                        return Ok(());
                    }
                    (*on_tick)(state)
                });
                if let Err(err) = worker.next(Some(tick)) {
                    trace!(%err, ticks, "interval tick not delivered, stopping");
                    return;
                }
            };
            drop(ticker);
            debug!(?wake, ticks, ?period, "interval stopped");

            if let Err(err) = worker.submit(None) {
                trace!(%err, "interval finalization not delivered");
            }
        }),
    )
}

//! Command line interface of the `script-timers` binary.
//!
//! Every timer given on the command line is scheduled on one
//! [`Runtime`](crate::Runtime) backed by a [`NativeEngine`]; the report lists
//! timers in the order they fired.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::Parser;
use core_types::Context;
use serde::Serialize;

use crate::engine::{native, NativeEngine};
use crate::error::{CliError, CliResult};
use crate::runtime::{Runtime, RuntimeOptions};
use crate::timers::{TimerHandle, TimerId};

/// Schedule timers on the event loop and report the order they fire in
#[derive(Parser, Debug)]
#[command(name = "script-timers", version, about)]
pub struct Cli {
    /// One-shot timer delay in milliseconds (repeatable)
    #[arg(short, long = "timeout", value_name = "MS", allow_negative_numbers = true)]
    pub timeouts: Vec<i64>,

    /// Interval cleared after COUNT ticks (repeatable)
    #[arg(short, long = "interval", value_name = "MSxCOUNT")]
    pub intervals: Vec<IntervalSpec>,

    /// Cancel everything still pending after this many milliseconds
    #[arg(short, long, value_name = "MS")]
    pub deadline: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// An `--interval` argument: period and number of ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSpec {
    /// Period in milliseconds
    pub period_ms: i64,
    /// Ticks before the interval clears itself
    pub count: u32,
}

impl FromStr for IntervalSpec {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CliError::InvalidInterval(s.to_string());
        let (period, count) = s.split_once('x').ok_or_else(invalid)?;
        Ok(Self {
            period_ms: period.trim().parse().map_err(|_| invalid())?,
            count: count.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Kind of timer in a [`Firing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    /// Set with `--timeout`
    Timeout,
    /// Set with `--interval`
    Interval,
}

/// One callback invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firing {
    /// Timer that fired
    pub id: TimerId,
    /// Its kind
    pub kind: TimerKind,
    /// Tick number, starting at 1; always 1 for timeouts
    pub tick: u32,
    /// Milliseconds since the loop started
    pub elapsed_ms: u64,
}

/// Outcome of a CLI run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Callbacks in the order they ran
    pub fired: Vec<Firing>,
    /// Set when `--deadline` ended the loop before every timer finished
    pub deadline_exceeded: bool,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for firing in &self.fired {
            let kind = match firing.kind {
                TimerKind::Timeout => "timeout",
                TimerKind::Interval => "interval",
            };
            writeln!(
                f,
                "{:>6}ms  {} {} tick {}",
                firing.elapsed_ms, kind, firing.id, firing.tick
            )?;
        }
        if self.deadline_exceeded {
            writeln!(f, "deadline exceeded")?;
        }
        Ok(())
    }
}

impl Cli {
    /// Schedules every requested timer and drives the loop to completion.
    ///
    /// # Errors
    /// Fails if a timer cannot be scheduled or the loop fails for a reason
    /// other than the deadline.
    pub fn execute(&self) -> CliResult<Report> {
        let mut options = RuntimeOptions::new();
        if let Some(ms) = self.deadline {
            options = options.with_context(Context::new().with_timeout(Duration::from_millis(ms)));
        }
        let mut runtime = Runtime::with_options(NativeEngine::new(), options);

        let start = Instant::now();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for &delay in &self.timeouts {
            let log = Rc::clone(&fired);
            runtime.timers_mut().set_timeout(
                native(move |handle: TimerHandle, _timers| {
                    log.borrow_mut().push(Firing {
                        id: handle.id(),
                        kind: TimerKind::Timeout,
                        tick: 1,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                    Ok(())
                }),
                delay,
            )?;
        }

        for spec in &self.intervals {
            let log = Rc::clone(&fired);
            let count = spec.count;
            let mut ticks = 0;
            let interval = runtime.timers_mut().set_interval(
                native(move |handle: TimerHandle, timers| {
                    ticks += 1;
                    log.borrow_mut().push(Firing {
                        id: handle.id(),
                        kind: TimerKind::Interval,
                        tick: ticks,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                    if ticks >= count {
                        timers.clear(&handle);
                    }
                    Ok(())
                }),
                spec.period_ms,
            )?;
            if count == 0 {
                runtime.timers_mut().clear_interval(&interval);
            }
        }

        let deadline_exceeded = match runtime.run_loop() {
            Ok(()) => false,
            Err(err) if err.context().is_some_and(|e| e.is_deadline()) => true,
            Err(err) => return Err(err.into()),
        };
        let fired = fired.borrow().clone();
        Ok(Report {
            fired,
            deadline_exceeded,
        })
    }

    /// Renders `report` the way `--json` asks for
    pub fn render(&self, report: &Report) -> CliResult<String> {
        if self.json {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(report.to_string())
        }
    }
}

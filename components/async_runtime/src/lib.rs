//! Async runtime for an embedded, single-threaded script interpreter.
//!
//! This crate provides the synchronization boundary between background work
//! and the one thread allowed to touch the interpreter:
//! - Event loop that executes delivered callbacks serially
//! - Per-job workers that hand intermediate and final results back
//! - One-shot and repeating timers built on the loop
//!
//! # Overview
//!
//! - [`Loop`] / [`SimpleLoop`] - Single-consumer scheduler owning the loop state
//! - [`Worker`] - Handle a background job uses to report back
//! - [`timer`] - Timeout and interval jobs, each independently cancellable
//!
//! # Examples
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{callback, Loop, SimpleLoop};
//! use core_types::Context;
//!
//! let event_loop = SimpleLoop::new();
//! let ctx = Context::new();
//!
//! event_loop
//!     .go(&ctx, Box::new(|worker| {
//!         for i in 0..3 {
//!             let _ = worker.next(callback(move |log: &mut Vec<u32>| {
//!                 log.push(i);
//!                 Ok(())
//!             }));
//!         }
//!         let _ = worker.submit(None);
//!     }))
//!     .unwrap();
//!
//! let mut log = Vec::new();
//! event_loop.run(&ctx, &mut log).unwrap();
//! assert_eq!(log, vec![0, 1, 2]);
//! ```
//!
//! ## Timer Usage
//!
//! ```
//! use async_runtime::{timer, Loop, SimpleLoop};
//! use core_types::Context;
//! use std::time::Duration;
//!
//! let event_loop: SimpleLoop<bool> = SimpleLoop::new();
//! let ctx = Context::new();
//! let signal = Context::new();
//!
//! let on_fire = |fired: &mut bool| {
//!     *fired = true;
//!     Ok(())
//! };
//! timer::schedule_timeout(&event_loop, &ctx, &signal, Duration::from_millis(5), on_fire).unwrap();
//!
//! let mut fired = false;
//! event_loop.run(&ctx, &mut fired).unwrap();
//! assert!(fired);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event_loop;
pub mod timer;
pub mod worker;

// Re-export main types at crate root
pub use config::LoopConfig;
pub use error::{CallbackError, LoopError};
pub use event_loop::{callback, Callback, CallbackResult, Job, Loop, SharedLoop, SimpleLoop};
pub use worker::{LoopWorker, Worker};

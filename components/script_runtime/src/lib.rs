//! Script Runtime Library
//!
//! Embeds a single-threaded script engine on top of the event loop and
//! exposes the timer surface scripts use: `set_timeout`, `clear_timeout`,
//! `set_interval` and `clear_interval`.
//!
//! ```
//! use script_runtime::{native, NativeEngine, Runtime};
//!
//! let mut runtime = Runtime::new(NativeEngine::new());
//! runtime
//!     .timers_mut()
//!     .set_timeout(native(|_handle, _timers| Ok(())), 5)
//!     .unwrap();
//! runtime.run_loop().unwrap();
//! assert_eq!(runtime.engine().calls(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod timers;

pub use cli::{Cli, Firing, IntervalSpec, Report, TimerKind};
pub use engine::{native, NativeEngine, NativeError, NativeFunction, ScriptEngine};
pub use error::{CliError, CliResult, RuntimeError};
pub use runtime::{Runtime, RuntimeOptions};
pub use timers::{Host, Interval, TimerHandle, TimerId, Timeout, Timers};

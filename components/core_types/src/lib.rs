//! Shared cancellation types for the script runtime.
//!
//! This crate provides the cancellation scope every blocking operation in the
//! runtime observes, and the error reported when a scope ends.
//!
//! # Overview
//!
//! - [`Context`] - Single-fire, hierarchical cancellation scope
//! - [`ContextError`] - Why a context ended
//!
//! # Examples
//!
//! ```
//! use core_types::{Context, ContextError};
//! use std::time::Duration;
//!
//! let runtime = Context::new();
//! let request = runtime.with_timeout(Duration::from_millis(5));
//!
//! assert_eq!(request.wait(), ContextError::DeadlineExceeded);
//! assert!(!runtime.is_done());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod context;
mod error;

pub use context::Context;
pub use error::ContextError;

//! Event loop configuration.

use serde::{Deserialize, Serialize};

/// Default name prefix for job threads.
pub const DEFAULT_THREAD_NAME: &str = "loop-job";

/// Settings for the threads a [`SimpleLoop`](crate::SimpleLoop) starts for its
/// jobs.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use async_runtime::LoopConfig;
///
/// let config: LoopConfig = serde_json::from_str(r#"{ "stack_size": 65536 }"#).unwrap();
/// assert_eq!(config.thread_name, "loop-job");
/// assert_eq!(config.stack_size, Some(65536));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Prefix of job thread names; the job number is appended
    pub thread_name: String,
    /// Stack size of job threads in bytes, or the platform default
    pub stack_size: Option<usize>,
}

impl LoopConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job thread name prefix
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the job thread stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

//! Error types for the cotask engine

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// Opaque error carried by a failed task.
///
/// Tasks report whatever error type they like; rescue decorators narrow it
/// back to a concrete type with [`downcast`](Box::downcast).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced at the engine boundary when a task chain does not succeed
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Task {task_name} failed: {source}")]
    TaskFailed { task_name: String, source: BoxError },

    #[error("Task {task_name} was cancelled")]
    TaskCancelled { task_name: String },

    #[error("Task {task_name} timed out after {duration:?}")]
    Timeout { task_name: String, duration: Duration },

    #[error("Task {task_name} was dropped before signalling completion")]
    Abandoned { task_name: String },

    #[error("No async runtime available to drive {task_name}")]
    NoRuntime { task_name: String },

    #[error("Task {task_name} panicked: {message}")]
    Panicked { task_name: String, message: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid timeout duration: {duration:?} (must be > 0)")]
    InvalidTimeout { duration: Duration },
}

/// Result type alias for engine executions
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ExecutionError {
    /// Create a task failure error
    pub fn task_failed<S: Into<String>>(task_name: S, source: BoxError) -> Self {
        ExecutionError::TaskFailed {
            task_name: task_name.into(),
            source,
        }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(task_name: S) -> Self {
        ExecutionError::TaskCancelled {
            task_name: task_name.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(task_name: S, duration: Duration) -> Self {
        ExecutionError::Timeout {
            task_name: task_name.into(),
            duration,
        }
    }

    /// Create an abandoned-completion error
    pub fn abandoned<S: Into<String>>(task_name: S) -> Self {
        ExecutionError::Abandoned {
            task_name: task_name.into(),
        }
    }

    /// Create a missing-runtime error
    pub fn no_runtime<S: Into<String>>(task_name: S) -> Self {
        ExecutionError::NoRuntime {
            task_name: task_name.into(),
        }
    }

    /// Create a panic error from an unwind payload
    pub fn panicked<S: Into<String>>(task_name: S, payload: Box<dyn Any + Send>) -> Self {
        ExecutionError::Panicked {
            task_name: task_name.into(),
            message: panic_message(payload),
        }
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::TaskCancelled { .. })
    }

    /// Check if this error indicates a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }

    /// Borrow the task's own error when it failed with a `T`
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            ExecutionError::TaskFailed { source, .. } => source.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take the task's own error out, if the task failed
    pub fn into_task_error(self) -> Option<BoxError> {
        match self {
            ExecutionError::TaskFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Create an invalid timeout error
    pub fn invalid_timeout(duration: Duration) -> Self {
        ConfigError::InvalidTimeout { duration }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_error_helpers() {
        let cancelled = ExecutionError::cancelled("save");
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());

        let timeout = ExecutionError::timeout("save", Duration::from_secs(5));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn test_task_failed_exposes_source() {
        let error = ExecutionError::task_failed("save", Box::new(DiskFull));
        assert!(error.downcast_ref::<DiskFull>().is_some());
        assert_eq!(error.to_string(), "Task save failed: disk full");

        let source = error.into_task_error().unwrap();
        assert!(source.downcast_ref::<DiskFull>().is_some());

        assert!(ExecutionError::abandoned("save").into_task_error().is_none());
    }

    #[test]
    fn test_panic_message_extraction() {
        let error = ExecutionError::panicked("load", Box::new("boom"));
        if let ExecutionError::Panicked { task_name, message } = error {
            assert_eq!(task_name, "load");
            assert_eq!(message, "boom");
        } else {
            panic!("Expected panic error");
        }

        let error = ExecutionError::panicked("load", Box::new(String::from("owned boom")));
        assert!(error.to_string().ends_with("owned boom"));

        let error = ExecutionError::panicked("load", Box::new(7u8));
        assert!(error.to_string().ends_with("Box<dyn Any>"));
    }

    #[test]
    fn test_config_error_helpers() {
        let invalid = ConfigError::invalid_timeout(Duration::from_secs(0));
        let ConfigError::InvalidTimeout { duration } = invalid;
        assert_eq!(duration, Duration::from_secs(0));
    }
}

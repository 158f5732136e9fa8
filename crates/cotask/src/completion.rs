//! Completion vocabulary and the one-shot completion slot

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{BoxError, ExecutionError, ExecutionResult};

/// Outcome of a single task execution
///
/// Untyped tasks complete with `Completion<()>`.
#[derive(Debug)]
pub enum Completion<T> {
    /// The task finished its work
    Succeeded(T),
    /// The task chose to stop without failing
    Cancelled,
    /// The task failed with an error
    Failed(BoxError),
}

/// The variant of a [`Completion`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionKind {
    Succeeded,
    Cancelled,
    Failed,
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionKind::Succeeded => f.write_str("succeeded"),
            CompletionKind::Cancelled => f.write_str("cancelled"),
            CompletionKind::Failed => f.write_str("failed"),
        }
    }
}

impl<T> Completion<T> {
    /// Build a failure from any error type
    pub fn failed<E: Into<BoxError>>(error: E) -> Self {
        Completion::Failed(error.into())
    }

    pub fn kind(&self) -> CompletionKind {
        match self {
            Completion::Succeeded(_) => CompletionKind::Succeeded,
            Completion::Cancelled => CompletionKind::Cancelled,
            Completion::Failed(_) => CompletionKind::Failed,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Completion::Succeeded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }

    /// The error of a failed completion
    pub fn error(&self) -> Option<&BoxError> {
        match self {
            Completion::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Transform the success payload, keeping cancellation and failure as they are
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Completion<U> {
        match self {
            Completion::Succeeded(value) => Completion::Succeeded(f(value)),
            Completion::Cancelled => Completion::Cancelled,
            Completion::Failed(error) => Completion::Failed(error),
        }
    }

    /// Convert to a standard `Result`, treating cancellation as an error
    pub fn into_result<S: Into<String>>(self, task_name: S) -> ExecutionResult<T> {
        match self {
            Completion::Succeeded(value) => Ok(value),
            Completion::Cancelled => Err(ExecutionError::cancelled(task_name)),
            Completion::Failed(error) => Err(ExecutionError::task_failed(task_name, error)),
        }
    }
}

impl<T, E: Into<BoxError>> From<Result<T, E>> for Completion<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Completion::Succeeded(value),
            Err(error) => Completion::Failed(error.into()),
        }
    }
}

type Callback<T> = Box<dyn FnOnce(Completion<T>) + Send + 'static>;

/// One-shot completion slot handed to [`Task::begin_execute`](crate::Task::begin_execute)
///
/// Clones share the same slot. The first call to [`complete`](Completer::complete)
/// takes the observer out of the slot before invoking it, so the observer runs
/// exactly once and any later signal is dropped. If every clone is dropped
/// without completing, the observer is dropped unfired.
pub struct Completer<T> {
    slot: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T: Send + 'static> Completer<T> {
    /// Register `observer` as the single consumer of this slot
    pub fn new<F>(observer: F) -> Self
    where
        F: FnOnce(Completion<T>) + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(observer)))),
        }
    }

    /// Signal completion. Returns `false` if the slot was already consumed.
    pub fn complete(&self, completion: Completion<T>) -> bool {
        // the guard must be released before the observer runs: synchronous
        // chains re-enter other slots from inside the callback
        let observer = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match observer {
            Some(observer) => {
                observer(completion);
                true
            }
            None => {
                trace!(kind = %completion.kind(), "ignoring completion on a consumed slot");
                false
            }
        }
    }

    pub fn succeed(&self, value: T) -> bool {
        self.complete(Completion::Succeeded(value))
    }

    pub fn cancel(&self) -> bool {
        self.complete(Completion::Cancelled)
    }

    pub fn fail<E: Into<BoxError>>(&self, error: E) -> bool {
        self.complete(Completion::Failed(error.into()))
    }
}

impl<T> Completer<T> {
    /// Whether the observer has already been taken out of the slot
    pub fn is_completed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

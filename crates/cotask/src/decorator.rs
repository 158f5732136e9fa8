//! Decorators that wrap one inner task and transform its completion
//!
//! Every decorator starts its inner task with an observer of its own. The
//! observer slot is consumed by the first signal, so the transform below runs
//! at most once per execution:
//!
//! ```text
//! Idle ──► InnerRunning ──┬──────────────────────────► Completed
//!                         └──► FollowUpRunning ──────► Completed
//! ```
//!
//! `FollowUpRunning` only exists for [`ContinueOnCancelDecorator`] and
//! [`RescueDecorator`]. Errors raised while producing or starting a follow-up
//! task are reported as the decorator's failure, never raised to the caller.

use std::error::Error;

use tracing::debug;

use crate::completion::{Completer, Completion};
use crate::context::ExecutionContext;
use crate::error::BoxError;
use crate::task::{start, BoxTask, Task};

/// Reports cancellation of the inner task as success
///
/// On cancellation the success value is the configured `cancel_result`;
/// success and failure pass through.
pub struct OverrideCancelDecorator<T> {
    inner: BoxTask<T>,
    cancel_result: T,
}

impl<T: Default + Send + 'static> OverrideCancelDecorator<T> {
    pub fn new(inner: impl Task<Output = T>) -> Self {
        Self::with_result(inner, T::default())
    }
}

impl<T: Send + 'static> OverrideCancelDecorator<T> {
    pub fn with_result(inner: impl Task<Output = T>, cancel_result: T) -> Self {
        Self {
            inner: Box::new(inner),
            cancel_result,
        }
    }
}

impl<T: Send + 'static> Task for OverrideCancelDecorator<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let OverrideCancelDecorator {
            inner,
            cancel_result,
        } = *self;

        let observer = Completer::new(move |completion: Completion<T>| {
            let completion = match completion {
                Completion::Cancelled => {
                    debug!("overriding cancellation with success");
                    Completion::Succeeded(cancel_result)
                }
                other => other,
            };
            completer.complete(completion);
        });
        start(inner, &context, observer);
        Ok(())
    }

    fn name(&self) -> String {
        format!("override_cancel({})", self.inner.name())
    }
}

type Continuation = Box<dyn FnOnce() -> Result<BoxTask<()>, BoxError> + Send + 'static>;

/// Runs a follow-up task when the inner task is cancelled
///
/// Success and failure of the inner task pass through. After a cancellation
/// the continuation runs under the same context; the decorator then reports
/// `Failed` if the continuation failed and `Cancelled` otherwise, so the
/// cancellation of the decorated work still stands once the follow-up is done.
pub struct ContinueOnCancelDecorator<T> {
    inner: BoxTask<T>,
    continuation: Continuation,
}

impl<T: Send + 'static> ContinueOnCancelDecorator<T> {
    pub fn new<F>(inner: impl Task<Output = T>, continuation: F) -> Self
    where
        F: FnOnce() -> Result<BoxTask<()>, BoxError> + Send + 'static,
    {
        Self {
            inner: Box::new(inner),
            continuation: Box::new(continuation),
        }
    }
}

impl<T: Send + 'static> Task for ContinueOnCancelDecorator<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let ContinueOnCancelDecorator {
            inner,
            continuation,
        } = *self;
        let follow_up_context = context.clone();

        let observer = Completer::new(move |completion: Completion<T>| {
            if !completion.is_cancelled() {
                completer.complete(completion);
                return;
            }

            let follow_up = match continuation() {
                Ok(task) => task,
                Err(error) => {
                    completer.complete(Completion::Failed(error));
                    return;
                }
            };

            debug!(task = %follow_up.name(), "inner task cancelled, running continuation");
            let follow_up_observer = Completer::new(move |completion: Completion<()>| {
                let completion = match completion {
                    Completion::Failed(error) => Completion::Failed(error),
                    Completion::Succeeded(()) | Completion::Cancelled => Completion::Cancelled,
                };
                completer.complete(completion);
            });
            start(follow_up, &follow_up_context, follow_up_observer);
        });
        start(inner, &context, observer);
        Ok(())
    }

    fn name(&self) -> String {
        format!("when_cancelled({})", self.inner.name())
    }
}

enum RescueAttempt<T> {
    Unmatched(BoxError),
    Matched(Result<BoxTask<T>, BoxError>),
}

type Rescuer<T> = Box<dyn FnOnce(BoxError) -> RescueAttempt<T> + Send + 'static>;

/// Substitutes a recovery task when the inner task fails with a given error type
///
/// Success, cancellation and failures of any other error type pass through.
/// When the error matches, the rescue factory receives it and its task runs
/// under the same context. Once that task completes the decorator reports:
///
/// - `Failed` if the rescue task failed
/// - `Cancelled` if it was cancelled, or if `cancel_after_rescue` is set
/// - otherwise the rescue task's success value
pub struct RescueDecorator<T> {
    inner: BoxTask<T>,
    rescuer: Rescuer<T>,
    filter: &'static str,
    cancel_after_rescue: bool,
}

impl<T: Send + 'static> RescueDecorator<T> {
    /// Rescue failures whose error is an `E`
    pub fn new<E, F>(inner: impl Task<Output = T>, rescue: F, cancel_after_rescue: bool) -> Self
    where
        E: Error + Send + Sync + 'static,
        F: FnOnce(Box<E>) -> Result<BoxTask<T>, BoxError> + Send + 'static,
    {
        let rescuer = move |error: BoxError| match error.downcast::<E>() {
            Ok(matched) => RescueAttempt::Matched(rescue(matched)),
            Err(other) => RescueAttempt::Unmatched(other),
        };
        Self {
            inner: Box::new(inner),
            rescuer: Box::new(rescuer),
            filter: std::any::type_name::<E>(),
            cancel_after_rescue,
        }
    }

    /// Rescue every failure
    pub fn any<F>(inner: impl Task<Output = T>, rescue: F, cancel_after_rescue: bool) -> Self
    where
        F: FnOnce(BoxError) -> Result<BoxTask<T>, BoxError> + Send + 'static,
    {
        let rescuer = move |error: BoxError| RescueAttempt::Matched(rescue(error));
        Self {
            inner: Box::new(inner),
            rescuer: Box::new(rescuer),
            filter: "any",
            cancel_after_rescue,
        }
    }
}

impl<T: Send + 'static> Task for RescueDecorator<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let RescueDecorator {
            inner,
            rescuer,
            filter,
            cancel_after_rescue,
        } = *self;
        let follow_up_context = context.clone();

        let observer = Completer::new(move |completion: Completion<T>| {
            let error = match completion {
                Completion::Failed(error) => error,
                other => {
                    completer.complete(other);
                    return;
                }
            };

            let rescue = match rescuer(error) {
                RescueAttempt::Unmatched(error) => {
                    completer.complete(Completion::Failed(error));
                    return;
                }
                RescueAttempt::Matched(Err(error)) => {
                    completer.complete(Completion::Failed(error));
                    return;
                }
                RescueAttempt::Matched(Ok(task)) => task,
            };

            debug!(filter, task = %rescue.name(), "rescuing failed task");
            let rescue_observer = Completer::new(move |completion: Completion<T>| {
                let completion = match completion {
                    Completion::Succeeded(_) if cancel_after_rescue => Completion::Cancelled,
                    other => other,
                };
                completer.complete(completion);
            });
            start(rescue, &follow_up_context, rescue_observer);
        });
        start(inner, &context, observer);
        Ok(())
    }

    fn name(&self) -> String {
        format!("rescue<{}>({})", self.filter, self.inner.name())
    }
}

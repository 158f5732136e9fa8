//! Core task abstraction and the fluent composition helpers

use std::error::Error;

use tracing::debug;

use crate::completion::{Completer, Completion};
use crate::context::ExecutionContext;
use crate::decorator::{ContinueOnCancelDecorator, OverrideCancelDecorator, RescueDecorator};
use crate::error::BoxError;

/// A boxed, type-erased task
pub type BoxTask<T> = Box<dyn Task<Output = T>>;

/// A single-use unit of deferred work with a one-shot completion signal
///
/// `begin_execute` may signal `completer` before returning (synchronous work)
/// or later from any thread (asynchronous work). Either way the completer is
/// signalled at most once. Because the method consumes the task, an instance
/// can never be executed twice.
///
/// Returning `Err` means the task could not even be started. The caller turns
/// that error into `Completion::Failed` on the same completer, so a task that
/// returns `Err` should not also signal.
pub trait Task: Send + 'static {
    /// Value produced on success; `()` for untyped tasks
    type Output: Send + 'static;

    /// Start the work described by this task
    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<Self::Output>,
    ) -> Result<(), BoxError>;

    /// Get a human-readable name for this task (used for logging and errors)
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<T: Send + 'static> Task for BoxTask<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let inner: BoxTask<T> = *self;
        inner.begin_execute(context, completer)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Start `task` under `context`, routing every start-up failure into `completer`
///
/// The context's pre-execution hook runs first; a hook error keeps the task
/// from starting. An `Err` from `begin_execute` is reported as a failure.
pub(crate) fn start<T: Send + 'static>(
    task: BoxTask<T>,
    context: &ExecutionContext,
    completer: Completer<T>,
) {
    let task_name = task.name();

    if let Err(error) = context.run_hook(&task_name) {
        debug!(task = %task_name, error = %error, "pre-execution hook rejected task");
        completer.complete(Completion::Failed(error));
        return;
    }

    debug!(task = %task_name, context = %context.id(), "starting task");
    if let Err(error) = task.begin_execute(context.clone(), completer.clone()) {
        debug!(task = %task_name, error = %error, "task failed to start");
        completer.complete(Completion::Failed(error));
    }
}

/// Fluent constructors for the decorators, available on every task
pub trait TaskExt: Task + Sized {
    /// Erase the concrete task type
    fn boxed(self) -> BoxTask<Self::Output> {
        Box::new(self)
    }

    /// Run the task produced by `continuation` when this task is cancelled
    fn when_cancelled<F>(self, continuation: F) -> ContinueOnCancelDecorator<Self::Output>
    where
        F: FnOnce() -> Result<BoxTask<()>, BoxError> + Send + 'static,
    {
        ContinueOnCancelDecorator::new(self, continuation)
    }

    /// Report cancellation as success with `Output::default()`
    fn override_cancel(self) -> OverrideCancelDecorator<Self::Output>
    where
        Self::Output: Default,
    {
        OverrideCancelDecorator::new(self)
    }

    /// Report cancellation as success with `cancel_result`
    fn override_cancel_with(
        self,
        cancel_result: Self::Output,
    ) -> OverrideCancelDecorator<Self::Output> {
        OverrideCancelDecorator::with_result(self, cancel_result)
    }

    /// Replace a failure of type `E` by the task produced by `rescue`
    fn rescue<E, F>(self, rescue: F, cancel_after_rescue: bool) -> RescueDecorator<Self::Output>
    where
        E: Error + Send + Sync + 'static,
        F: FnOnce(Box<E>) -> Result<BoxTask<Self::Output>, BoxError> + Send + 'static,
    {
        RescueDecorator::new::<E, F>(self, rescue, cancel_after_rescue)
    }

    /// Replace any failure by the task produced by `rescue`
    fn rescue_any<F>(self, rescue: F, cancel_after_rescue: bool) -> RescueDecorator<Self::Output>
    where
        F: FnOnce(BoxError) -> Result<BoxTask<Self::Output>, BoxError> + Send + 'static,
    {
        RescueDecorator::any(self, rescue, cancel_after_rescue)
    }
}

impl<T: Task> TaskExt for T {}

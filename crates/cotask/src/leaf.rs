//! Leaf tasks that produce a completion without delegating to another task

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::completion::{Completer, Completion};
use crate::context::ExecutionContext;
use crate::error::{BoxError, ExecutionError};
use crate::task::Task;

type Delegate<T> = Box<dyn FnOnce(&ExecutionContext) -> Result<T, BoxError> + Send + 'static>;

/// Runs a synchronous function inside `begin_execute`
///
/// An `Err` from the function, or a panic, is reported as `Failed`; the
/// returned value becomes the success payload.
pub struct DelegateTask<T> {
    delegate: Delegate<T>,
    name: String,
}

impl<T: Send + 'static> DelegateTask<T> {
    pub fn new<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::with_context(move |_| f())
    }

    /// Like [`new`](Self::new), but the function sees the chain's context
    pub fn with_context<F, E>(f: F) -> Self
    where
        F: FnOnce(&ExecutionContext) -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            delegate: Box::new(move |context| f(context).map_err(Into::into)),
            name: "delegate".to_string(),
        }
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Send + 'static> Task for DelegateTask<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let DelegateTask { delegate, name } = *self;

        let completion = match catch_unwind(AssertUnwindSafe(|| delegate(&context))) {
            Ok(result) => Completion::from(result),
            Err(payload) => Completion::failed(ExecutionError::panicked(name, payload)),
        };
        completer.complete(completion);
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Reports a fixed completion synchronously, doing no work
pub struct ImmediateTask<T> {
    completion: Completion<T>,
}

impl ImmediateTask<()> {
    pub fn succeeded() -> Self {
        Self::from_completion(Completion::Succeeded(()))
    }
}

impl<T: Send + 'static> ImmediateTask<T> {
    pub fn with_result(value: T) -> Self {
        Self::from_completion(Completion::Succeeded(value))
    }

    pub fn cancelled() -> Self {
        Self::from_completion(Completion::Cancelled)
    }

    pub fn failed<E: Into<BoxError>>(error: E) -> Self {
        Self::from_completion(Completion::failed(error))
    }

    pub fn from_completion(completion: Completion<T>) -> Self {
        Self { completion }
    }
}

impl<T: Send + 'static> Task for ImmediateTask<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        _context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        completer.complete(self.completion);
        Ok(())
    }

    fn name(&self) -> String {
        format!("ImmediateTask({})", self.completion.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskExt;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, thiserror::Error)]
    #[error("validation failed: {0}")]
    struct ValidationError(String);

    fn run_now<T: Send + 'static>(
        task: impl Task<Output = T>,
        context: ExecutionContext,
    ) -> Completion<T> {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let completer = Completer::new(move |completion| *sink.lock().unwrap() = Some(completion));
        task.boxed().begin_execute(context, completer).unwrap();
        let completion = seen.lock().unwrap().take();
        completion.expect("leaf tasks complete synchronously")
    }

    #[test]
    fn test_delegate_captures_result() {
        let task = DelegateTask::new(|| Ok::<_, BoxError>(42));
        let completion = run_now(task, ExecutionContext::new());
        assert!(matches!(completion, Completion::Succeeded(42)));
    }

    #[test]
    fn test_delegate_error_becomes_failure() {
        let task = DelegateTask::new(|| -> Result<(), ValidationError> {
            Err(ValidationError("empty name".into()))
        });
        let completion = run_now(task, ExecutionContext::new());

        let error = completion.error().unwrap();
        assert!(error.downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn test_delegate_panic_becomes_failure() {
        let task = DelegateTask::new(|| -> Result<u8, BoxError> { panic!("delegate blew up") })
            .named("explosive");
        let completion = run_now(task, ExecutionContext::new());

        let error = completion.error().unwrap();
        match error.downcast_ref::<ExecutionError>() {
            Some(ExecutionError::Panicked { task_name, message }) => {
                assert_eq!(task_name, "explosive");
                assert_eq!(message, "delegate blew up");
            }
            other => panic!("Expected panic error, got {:?}", other),
        }
    }

    #[test]
    fn test_delegate_sees_context() {
        let context = ExecutionContext::new().with_source("toolbar".to_string());
        let task = DelegateTask::with_context(|context: &ExecutionContext| {
            let source = context.source::<String>().ok_or("missing source")?;
            context.set_target(source.len());
            Ok::<_, BoxError>(source)
        });

        let completion = run_now(task, context.clone());
        assert!(matches!(completion, Completion::Succeeded(ref s) if s == "toolbar"));
        assert_eq!(context.target::<usize>(), Some(7));
    }

    #[test]
    fn test_immediate_variants() {
        assert!(run_now(ImmediateTask::succeeded(), ExecutionContext::new()).is_succeeded());
        assert!(run_now(ImmediateTask::<()>::cancelled(), ExecutionContext::new()).is_cancelled());
        assert!(matches!(
            run_now(ImmediateTask::with_result("ok"), ExecutionContext::new()),
            Completion::Succeeded("ok")
        ));

        let failed = run_now(
            ImmediateTask::<()>::failed(ValidationError("x".into())),
            ExecutionContext::new(),
        );
        assert!(failed.error().unwrap().downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn test_names() {
        assert_eq!(DelegateTask::new(|| Ok::<_, BoxError>(())).name(), "delegate");
        assert_eq!(ImmediateTask::<()>::cancelled().name(), "ImmediateTask(cancelled)");
    }
}

//! Bridge from native futures to the task protocol

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::{AbortHandle, AbortRegistration, Abortable, FutureExt};
use tokio::runtime::Handle;
use tracing::trace;

use crate::completion::{Completer, Completion};
use crate::context::ExecutionContext;
use crate::error::{BoxError, ExecutionError};
use crate::task::Task;
use crate::BoxFuture;

/// Wraps a future and reports its outcome as a completion
///
/// The future is spawned on a tokio runtime when the task starts: the one
/// given to [`on_runtime`](Self::on_runtime), otherwise the ambient one.
/// Aborting the handle from [`abort_handle`](Self::abort_handle) makes the
/// task report `Cancelled`.
pub struct FutureAdapterTask<T> {
    future: BoxFuture<Completion<T>>,
    abort_handle: AbortHandle,
    abort_registration: AbortRegistration,
    runtime: Option<Handle>,
    name: String,
}

impl<T: Send + 'static> FutureAdapterTask<T> {
    /// Adapt a fallible future: `Ok(v)` succeeds with `v`, `Err(e)` fails with `e`
    pub fn new<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::from_completion(future.map(Completion::from))
    }

    /// Adapt a future that already decides its own completion, cancellation included
    pub fn from_completion<F>(future: F) -> Self
    where
        F: Future<Output = Completion<T>> + Send + 'static,
    {
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        Self {
            future: Box::pin(future),
            abort_handle,
            abort_registration,
            runtime: None,
            name: "future".to_string(),
        }
    }

    /// Spawn on `runtime` instead of the ambient runtime
    pub fn on_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Handle that cancels the wrapped future, before or after the task starts
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }
}

impl<T: Send + 'static> Task for FutureAdapterTask<T> {
    type Output = T;

    fn begin_execute(
        self: Box<Self>,
        _context: ExecutionContext,
        completer: Completer<T>,
    ) -> Result<(), BoxError> {
        let FutureAdapterTask {
            future,
            abort_registration,
            runtime,
            name,
            ..
        } = *self;

        let runtime = match runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| ExecutionError::no_runtime(name.clone()))?,
        };

        let guarded = AssertUnwindSafe(Abortable::new(future, abort_registration)).catch_unwind();
        runtime.spawn(async move {
            let completion = match guarded.await {
                Ok(Ok(completion)) => completion,
                Ok(Err(_aborted)) => {
                    trace!(task = %name, "wrapped future aborted");
                    Completion::Cancelled
                }
                Err(payload) => Completion::failed(ExecutionError::panicked(name, payload)),
            };
            completer.complete(completion);
        });
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskExt;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    async fn run<T: Send + 'static>(task: FutureAdapterTask<T>) -> Completion<T> {
        let (sender, receiver) = oneshot::channel();
        let completer = Completer::new(move |completion| {
            let _ = sender.send(completion);
        });
        task.boxed()
            .begin_execute(ExecutionContext::new(), completer)
            .unwrap();
        receiver.await.unwrap()
    }

    #[tokio::test]
    async fn test_resolved_future_succeeds_with_value() {
        let task = FutureAdapterTask::new(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, BoxError>(42)
        });
        assert!(matches!(run(task).await, Completion::Succeeded(42)));
    }

    #[tokio::test]
    async fn test_rejected_future_fails() {
        let task = FutureAdapterTask::new(async { Err::<(), _>(ConnectionReset) });
        let completion = run(task).await;
        assert!(completion.error().unwrap().downcast_ref::<ConnectionReset>().is_some());
    }

    #[tokio::test]
    async fn test_aborted_future_is_cancelled() {
        let task = FutureAdapterTask::new(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, BoxError>(())
        });
        task.abort_handle().abort();
        assert!(run(task).await.is_cancelled());
    }

    #[tokio::test]
    async fn test_completion_future_can_cancel_itself() {
        let task = FutureAdapterTask::from_completion(async { Completion::<u8>::Cancelled });
        assert!(run(task).await.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_future_fails() {
        let task = FutureAdapterTask::new(async {
            if true {
                panic!("poll exploded");
            }
            Ok::<u8, BoxError>(0)
        })
        .named("unstable");

        let completion = run(task).await;
        match completion.error().and_then(|e| e.downcast_ref::<ExecutionError>()) {
            Some(ExecutionError::Panicked { task_name, message }) => {
                assert_eq!(task_name, "unstable");
                assert_eq!(message, "poll exploded");
            }
            other => panic!("Expected panic error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_runtime_fails_to_start() {
        let task = FutureAdapterTask::new(async { Ok::<_, BoxError>(()) }).named("orphan");
        let completer = Completer::new(|_: Completion<()>| panic!("must not signal"));

        let error = task
            .boxed()
            .begin_execute(ExecutionContext::new(), completer)
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::NoRuntime { task_name }) if task_name == "orphan"
        ));
    }

    #[test]
    fn test_explicit_runtime_is_used() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let task = FutureAdapterTask::new(async { Ok::<_, BoxError>(5u8) })
            .on_runtime(runtime.handle().clone());

        let (sender, receiver) = oneshot::channel();
        let completer = Completer::new(move |completion| {
            let _ = sender.send(completion);
        });
        task.boxed()
            .begin_execute(ExecutionContext::new(), completer)
            .unwrap();

        let completion = runtime.block_on(receiver).unwrap();
        assert!(matches!(completion, Completion::Succeeded(5)));
    }
}

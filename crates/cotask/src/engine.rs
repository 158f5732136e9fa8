//! The execution engine: entry points that start task chains and report their outcome

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::adapter::FutureAdapterTask;
use crate::completion::{Completer, Completion};
use crate::context::{ContextId, ExecutionContext, ExecutionHook};
use crate::error::{BoxError, ConfigResult, ExecutionError, ExecutionResult};
use crate::leaf::DelegateTask;
use crate::reporter::{ExecutionReporter, NoOpReporter, TaskExecutionEvent};
use crate::sequential::SequentialTask;
use crate::task::{start, BoxTask, Task};
use crate::types::{EngineConfig, ExecutionStats};

/// Starts task chains and turns their completion into callbacks or futures
///
/// Every execution goes through the same path: the engine's pre-execution
/// hook is attached to the context, the reporter sees a start event, the
/// root task is started, and once it signals the completion is logged,
/// counted and reported before the caller is notified.
///
/// Clones share configuration, hook, reporter and statistics.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    hook: Option<Arc<dyn ExecutionHook>>,
    reporter: Arc<Mutex<Box<dyn ExecutionReporter>>>,
    stats: Arc<Mutex<ExecutionStats>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("hook", &self.hook.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Engine {
    /// Create a new engine with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            hook: None,
            reporter: Arc::new(Mutex::new(Box::new(NoOpReporter))),
            stats: Arc::new(Mutex::new(ExecutionStats::default())),
        }
    }

    /// Create a new engine with custom configuration
    pub fn with_config(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Run `hook` before every task the engine starts, nested tasks included
    pub fn with_hook<H: ExecutionHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Send start and completion events of root executions to `reporter`
    pub fn with_reporter<R: ExecutionReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(Mutex::new(Box::new(reporter)));
        self
    }

    /// Get the current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the statistics collected so far
    pub fn stats(&self) -> ExecutionStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = ExecutionStats::default();
    }

    /// Label the events the reporter receives from now on
    pub fn set_reporter_context<S: Into<String>>(&self, context: S) {
        self.reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_context(context.into());
    }

    /// Tell the reporter no more events will follow
    pub fn finish_reporting(&self) {
        self.reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();
    }

    /// Start `task` under `context` and invoke `callback` with its completion
    ///
    /// `callback` runs exactly once, possibly before this method returns and
    /// possibly on another thread. A hook rejection or an error returned by
    /// the task's `begin_execute` arrives as `Completion::Failed`; nothing is
    /// raised to the caller.
    pub fn begin_execute<K, F>(&self, task: K, mut context: ExecutionContext, callback: F)
    where
        K: Task,
        F: FnOnce(Completion<K::Output>) + Send + 'static,
    {
        context.set_hook(self.hook.clone());

        let task_name = task.name();
        let context_id = context.id();
        self.report(TaskExecutionEvent::ExecutionStarted {
            context_id,
            task_name: task_name.clone(),
        });

        let engine = self.clone();
        let started = Instant::now();
        let completer = Completer::new(move |completion: Completion<K::Output>| {
            engine.record_completion(task_name, context_id, &completion, started.elapsed());
            callback(completion);
        });

        let task: BoxTask<K::Output> = Box::new(task);
        start(task, &context, completer);
    }

    /// Execute `task` under `context` and await its outcome
    ///
    /// Cancellation resolves to [`ExecutionError::TaskCancelled`], a failure to
    /// [`ExecutionError::TaskFailed`] carrying the task's error. When the
    /// configured timeout elapses first the caller gets
    /// [`ExecutionError::Timeout`] while the chain keeps running.
    pub async fn execute_async<K: Task>(
        &self,
        task: K,
        context: ExecutionContext,
    ) -> ExecutionResult<K::Output> {
        let task_name = task.name();
        let (sender, receiver) = oneshot::channel();
        self.begin_execute(task, context, move |completion| {
            // the caller may have stopped waiting
            let _ = sender.send(completion);
        });

        let received = match self.config.execution_timeout {
            Some(duration) => match tokio::time::timeout(duration, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(task = %task_name, ?duration, "stopped waiting for task");
                    return Err(ExecutionError::timeout(task_name, duration));
                }
            },
            None => receiver.await,
        };

        match received {
            Ok(completion) => completion.into_result(task_name),
            Err(_) => {
                warn!(task = %task_name, "task dropped its completer without signalling");
                Err(ExecutionError::abandoned(task_name))
            }
        }
    }

    /// Execute `task` with a fresh, empty context
    pub async fn execute<K: Task>(&self, task: K) -> ExecutionResult<K::Output> {
        self.execute_async(task, ExecutionContext::new()).await
    }

    fn record_completion<T>(
        &self,
        task_name: String,
        context_id: ContextId,
        completion: &Completion<T>,
        duration: Duration,
    ) {
        let outcome = completion.kind();
        match completion {
            Completion::Failed(error) if self.config.log_failures => {
                error!(
                    task = %task_name,
                    context = %context_id,
                    error = %error,
                    "task execution failed"
                );
            }
            Completion::Cancelled if self.config.log_cancellations => {
                info!(task = %task_name, context = %context_id, "task execution cancelled");
            }
            _ => {
                debug!(
                    task = %task_name,
                    context = %context_id,
                    %outcome,
                    ?duration,
                    "task execution finished"
                );
            }
        }

        if self.config.collect_stats {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(outcome, duration);
        }

        self.report(TaskExecutionEvent::ExecutionCompleted {
            context_id,
            task_name,
            outcome,
            error: completion.error().map(ToString::to_string),
            duration,
        });
    }

    fn report(&self, event: TaskExecutionEvent) {
        self.reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .report_event(event);
    }
}

/// Wrap a synchronous function as a task
pub fn as_task<T, E, F>(f: F) -> DelegateTask<T>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    DelegateTask::new(f)
}

/// Wrap a future as a task
pub fn from_future<T, E, F>(future: F) -> FutureAdapterTask<T>
where
    T: Send + 'static,
    E: Into<BoxError> + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    FutureAdapterTask::new(future)
}

/// Run a lazily produced list of tasks one after another
pub fn sequence<I>(steps: I) -> SequentialTask
where
    I: IntoIterator<Item = BoxTask<()>>,
    I::IntoIter: Send + 'static,
{
    SequentialTask::new(steps)
}

//! Completion reporting for root executions
//!
//! The engine reports one pair of events per execution it starts. Reporters
//! observe root chains only; tasks nested inside a chain are not reported
//! individually.

use std::time::Duration;

use crate::completion::CompletionKind;
use crate::context::ContextId;

/// Event types that can be reported during an execution
#[derive(Debug, Clone)]
pub enum TaskExecutionEvent {
    /// The engine started a root task
    ExecutionStarted {
        context_id: ContextId,
        task_name: String,
    },
    /// The root task signalled its completion
    ExecutionCompleted {
        context_id: ContextId,
        task_name: String,
        outcome: CompletionKind,
        /// Failure message, if the task failed
        error: Option<String>,
        duration: Duration,
    },
}

impl TaskExecutionEvent {
    pub fn task_name(&self) -> &str {
        match self {
            TaskExecutionEvent::ExecutionStarted { task_name, .. }
            | TaskExecutionEvent::ExecutionCompleted { task_name, .. } => task_name,
        }
    }
}

/// Trait for observing root executions
///
/// Implement this to forward completion notifications to an external
/// progress or telemetry system.
pub trait ExecutionReporter: Send + Sync {
    /// Report an execution event
    fn report_event(&mut self, event: TaskExecutionEvent);

    /// Set a label prefixed to subsequent events
    fn set_context(&mut self, context: String) {
        let _ = context;
    }

    /// Called when the reporter is no longer needed
    fn finish(&mut self) {}
}

/// A reporter that discards all events
#[derive(Debug, Default)]
pub struct NoOpReporter;

impl ExecutionReporter for NoOpReporter {
    fn report_event(&mut self, _event: TaskExecutionEvent) {}
}

/// Prints one line per event to stdout
#[derive(Debug, Default)]
pub struct SimpleConsoleReporter {
    context: Option<String>,
}

impl SimpleConsoleReporter {
    pub fn new() -> Self {
        Self { context: None }
    }

    fn format_duration(duration: Duration) -> String {
        if duration.as_secs() > 0 {
            format!("{:.1}s", duration.as_secs_f32())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    fn format_event(&self, event: &TaskExecutionEvent) -> String {
        let prefix = self
            .context
            .as_ref()
            .map(|c| format!("[{}] ", c))
            .unwrap_or_default();

        match event {
            TaskExecutionEvent::ExecutionStarted { task_name, .. } => {
                format!("{}Started {}", prefix, task_name)
            }
            TaskExecutionEvent::ExecutionCompleted {
                task_name,
                outcome: CompletionKind::Failed,
                error,
                duration,
                ..
            } => format!(
                "{}Failed {} after {} - {}",
                prefix,
                task_name,
                Self::format_duration(*duration),
                error.as_deref().unwrap_or("unknown error")
            ),
            TaskExecutionEvent::ExecutionCompleted {
                task_name,
                outcome,
                duration,
                ..
            } => format!(
                "{}{} {} in {}",
                prefix,
                if *outcome == CompletionKind::Cancelled { "Cancelled" } else { "Completed" },
                task_name,
                Self::format_duration(*duration)
            ),
        }
    }
}

impl ExecutionReporter for SimpleConsoleReporter {
    fn report_event(&mut self, event: TaskExecutionEvent) {
        println!("{}", self.format_event(&event));
    }

    fn set_context(&mut self, context: String) {
        self.context = Some(context);
    }
}

/// Broadcasts events to several reporters
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn ExecutionReporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter<R: ExecutionReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl ExecutionReporter for MultiReporter {
    fn report_event(&mut self, event: TaskExecutionEvent) {
        for reporter in &mut self.reporters {
            reporter.report_event(event.clone());
        }
    }

    fn set_context(&mut self, context: String) {
        for reporter in &mut self.reporters {
            reporter.set_context(context.clone());
        }
    }

    fn finish(&mut self) {
        for reporter in &mut self.reporters {
            reporter.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct TestReporter {
        events: Arc<Mutex<Vec<TaskExecutionEvent>>>,
        finished: Arc<Mutex<bool>>,
    }

    impl ExecutionReporter for TestReporter {
        fn report_event(&mut self, event: TaskExecutionEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn finish(&mut self) {
            *self.finished.lock().unwrap() = true;
        }
    }

    fn started(name: &str) -> TaskExecutionEvent {
        TaskExecutionEvent::ExecutionStarted {
            context_id: ContextId::new(),
            task_name: name.to_string(),
        }
    }

    #[test]
    fn test_console_reporter_formatting() {
        let mut reporter = SimpleConsoleReporter::new();
        assert_eq!(reporter.format_event(&started("save")), "Started save");

        reporter.set_context("editor".to_string());
        let failed = TaskExecutionEvent::ExecutionCompleted {
            context_id: ContextId::new(),
            task_name: "save".to_string(),
            outcome: CompletionKind::Failed,
            error: Some("disk full".to_string()),
            duration: Duration::from_millis(12),
        };
        assert_eq!(reporter.format_event(&failed), "[editor] Failed save after 12ms - disk full");

        let cancelled = TaskExecutionEvent::ExecutionCompleted {
            context_id: ContextId::new(),
            task_name: "save".to_string(),
            outcome: CompletionKind::Cancelled,
            error: None,
            duration: Duration::from_millis(1500),
        };
        assert_eq!(reporter.format_event(&cancelled), "[editor] Cancelled save in 1.5s");
    }

    #[test]
    fn test_multi_reporter() {
        let first = TestReporter::default();
        let second = TestReporter::default();
        let events1 = first.events.clone();
        let events2 = second.events.clone();
        let finished = second.finished.clone();

        let mut multi = MultiReporter::new().add_reporter(first).add_reporter(second);
        multi.report_event(started("load"));
        multi.finish();

        assert_eq!(events1.lock().unwrap().len(), 1);
        assert_eq!(events2.lock().unwrap()[0].task_name(), "load");
        assert!(*finished.lock().unwrap());
    }

    #[test]
    fn test_no_op_reporter() {
        let mut reporter = NoOpReporter;
        reporter.report_event(started("noop"));
        reporter.set_context("test".to_string());
        reporter.finish();
    }
}

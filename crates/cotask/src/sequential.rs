//! Sequential execution of a lazily produced list of tasks

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::completion::{Completer, Completion};
use crate::context::ExecutionContext;
use crate::error::BoxError;
use crate::task::{start, BoxTask, Task};

type Steps = Box<dyn Iterator<Item = Result<BoxTask<()>, BoxError>> + Send + 'static>;

/// Runs tasks one after another, stopping at the first one that does not succeed
///
/// Steps are pulled from the iterator only when the previous step has
/// succeeded, so producers of later steps are never invoked after a
/// cancellation or failure. All steps share the context passed to the
/// sequence. The iterator is dropped as soon as the sequence completes.
pub struct SequentialTask {
    steps: Steps,
}

impl SequentialTask {
    pub fn new<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = BoxTask<()>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_fallible(steps.into_iter().map(Ok))
    }

    /// Build from an iterator whose production of a step may itself fail
    ///
    /// An `Err` item completes the sequence with that error.
    pub fn from_fallible<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = Result<BoxTask<()>, BoxError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            steps: Box::new(steps.into_iter()),
        }
    }
}

impl Task for SequentialTask {
    type Output = ();

    fn begin_execute(
        self: Box<Self>,
        context: ExecutionContext,
        completer: Completer<()>,
    ) -> Result<(), BoxError> {
        let run = Box::new(SequenceRun {
            steps: self.steps,
            context,
            completer,
            started: 0,
        });
        // starting behaves like the completion of a successful step
        run.advance();
        Ok(())
    }

    fn name(&self) -> String {
        "sequence".to_string()
    }
}

struct SequenceRun {
    steps: Steps,
    context: ExecutionContext,
    completer: Completer<()>,
    started: usize,
}

/// Hand-over point between a running step and the loop that started it
enum Handoff {
    /// `start` has not returned yet
    Starting,
    /// The step completed before `start` returned
    Completed(Completion<()>),
    /// `start` returned first; the step's observer resumes the sequence
    Parked(Box<SequenceRun>),
}

impl SequenceRun {
    /// Start steps until one completes asynchronously or the sequence ends
    ///
    /// Steps that complete synchronously are picked up by this loop instead
    /// of recursing through their observers, so the stack depth does not
    /// grow with the length of the sequence.
    fn advance(mut self: Box<Self>) {
        loop {
            let step = match self.steps.next() {
                None => return self.finish(Completion::Succeeded(())),
                Some(Err(error)) => return self.finish(Completion::Failed(error)),
                Some(Ok(step)) => step,
            };

            self.started += 1;
            trace!(step = self.started, task = %step.name(), "advancing sequence");

            let handoff = Arc::new(Mutex::new(Handoff::Starting));
            let observer_handoff = Arc::clone(&handoff);
            let observer = Completer::new(move |completion: Completion<()>| {
                let mut slot = observer_handoff.lock().unwrap_or_else(PoisonError::into_inner);
                match mem::replace(&mut *slot, Handoff::Starting) {
                    Handoff::Parked(run) => {
                        drop(slot);
                        run.resume(completion);
                    }
                    Handoff::Starting | Handoff::Completed(_) => {
                        *slot = Handoff::Completed(completion);
                    }
                }
            });
            start(step, &self.context, observer);

            let mut slot = handoff.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::replace(&mut *slot, Handoff::Starting) {
                Handoff::Completed(Completion::Succeeded(())) => {}
                Handoff::Completed(other) => {
                    drop(slot);
                    return self.finish(other);
                }
                Handoff::Starting | Handoff::Parked(_) => {
                    *slot = Handoff::Parked(self);
                    return;
                }
            }
        }
    }

    fn resume(self: Box<Self>, completion: Completion<()>) {
        match completion {
            Completion::Succeeded(()) => self.advance(),
            other => self.finish(other),
        }
    }

    fn finish(self: Box<Self>, completion: Completion<()>) {
        let SequenceRun {
            steps,
            context,
            completer,
            started,
        } = *self;
        drop(steps);
        drop(context);

        debug!(steps = started, outcome = %completion.kind(), "sequence finished");
        completer.complete(completion);
    }
}

use super::report::StepOutcome;

/// Events emitted by the pipeline while a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        operation: String,
    },
    StepFinished(StepOutcome),
    Completed {
        final_path: String,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

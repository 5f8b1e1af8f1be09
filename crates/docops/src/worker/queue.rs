use crate::error::WorkerError;

use super::task::{PipelineTask, TaskOutput};

/// State of a submitted task as seen by the queue.
#[derive(Debug, Clone)]
pub enum TaskState {
    Pending,
    Started,
    Succeeded(TaskOutput),
    Failed(String),
    Revoked,
    /// The queue has no record of the task.
    Unknown,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::Revoked)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        }
    }
}

/// Submit a unit of work, later poll its state and fetch its return value.
pub trait TaskQueue: Send + Sync {
    fn submit(&self, task_id: &str, task: PipelineTask) -> Result<(), WorkerError>;

    fn poll(&self, task_id: &str) -> TaskState;

    /// Asks the queue to stop a task. Returns false when the task is
    /// unknown or already finished.
    fn revoke(&self, task_id: &str) -> bool;

    /// Drops the queue's record of a finished task once its outcome has been
    /// persisted elsewhere. Pending and running tasks are kept.
    fn forget(&self, task_id: &str);
}

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures of a pipeline run. Per-step transform failures are not
/// errors; they are recorded in the run report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Unsupported document type: {0}")]
    UnsupportedFormat(String),

    #[error("Run cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("Run timed out before step {step}")]
    TimedOut { step: usize },

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),
}

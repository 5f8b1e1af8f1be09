use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{StorageError, WorkerError};

use super::types::JobStatus;

/// Failure of a job store backing.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Corrupt record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("File '{0}' not found")]
    FileNotFound(String),

    #[error("Job '{job_id}' is not completed (current status: {status})")]
    NotReady { job_id: String, status: JobStatus },

    #[error("Source '{0}' already has a queued or running job")]
    Conflict(String),

    #[error("Result of job '{0}' is no longer available")]
    ResultUnavailable(String),

    #[error("No filename provided")]
    MissingFilename,

    #[error("Unsupported file type: '{0}'. Allowed: .docx, .pdf")]
    UnsupportedFileType(String),

    #[error("Empty file uploaded")]
    EmptyUpload,

    #[error("File size {size} exceeds the maximum of {limit_mb} MB")]
    UploadTooLarge { size: u64, limit_mb: u64 },

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task queue error: {0}")]
    Queue(#[from] WorkerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

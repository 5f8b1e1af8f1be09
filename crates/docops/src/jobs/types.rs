use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::{DocumentFamily, Operation};
use crate::pipeline::StepOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// The task queue reported a state with no lifecycle meaning, e.g. revoked.
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// File status mirroring a job status. `None` leaves the file as is.
    pub fn mirror(job: JobStatus) -> Option<Self> {
        match job {
            JobStatus::Queued => Some(Self::Queued),
            JobStatus::Processing => Some(Self::Processing),
            JobStatus::Completed => Some(Self::Completed),
            JobStatus::Failed => Some(Self::Failed),
            JobStatus::Unknown => None,
        }
    }
}

/// A submitted pipeline run and everything known about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    /// Upload the job was created from, if any.
    pub file_id: Option<String>,
    pub source_path: PathBuf,
    pub family: DocumentFamily,
    pub status: JobStatus,
    pub operations: Vec<Operation>,
    pub output_filename: String,
    pub result_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepOutcome>,
    pub cleanup_scheduled: bool,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(
        job_id: impl Into<String>,
        source_path: impl Into<PathBuf>,
        family: DocumentFamily,
        operations: Vec<Operation>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            file_id: None,
            source_path: source_path.into(),
            family,
            status: JobStatus::Queued,
            operations,
            output_filename: output_filename.into(),
            result_path: None,
            output_dir: None,
            message: None,
            error: None,
            steps: Vec::new(),
            cleanup_scheduled: false,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// An accepted upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub original_filename: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    /// Most recent job created from this file.
    pub job_id: Option<String>,
    pub processed_path: Option<PathBuf>,
}

/// Point-in-time view of a job returned by status polling.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub output_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
}

/// Returned when a processing request is accepted.
#[derive(Debug, Clone, Serialize)]
pub struct JobReceipt {
    pub job_id: String,
    pub file_id: String,
    pub status: JobStatus,
    pub message: String,
    pub status_check_url: String,
    pub result_download_url: String,
}

impl JobReceipt {
    pub fn queued(job_id: &str, file_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_id: file_id.to_string(),
            status: JobStatus::Queued,
            message: "Document processing job accepted and queued.".to_string(),
            status_check_url: status_url(job_id),
            result_download_url: download_url(job_id),
        }
    }
}

pub fn status_url(job_id: &str) -> String {
    format!("/jobs/{}/status", job_id)
}

pub fn download_url(job_id: &str) -> String {
    format!("/jobs/{}/download", job_id)
}

/// Content of a completed job's result, read before its cleanup is scheduled.
#[derive(Debug, Clone)]
pub struct ResultDownload {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Body of a processing request for an uploaded file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub output_filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_mirrors_job_status() {
        assert_eq!(FileStatus::mirror(JobStatus::Processing), Some(FileStatus::Processing));
        assert_eq!(FileStatus::mirror(JobStatus::Completed), Some(FileStatus::Completed));
        assert_eq!(FileStatus::mirror(JobStatus::Unknown), None);
    }

    #[test]
    fn test_receipt_urls() {
        let receipt = JobReceipt::queued("abc", "f1");
        assert_eq!(receipt.status_check_url, "/jobs/abc/status");
        assert_eq!(receipt.result_download_url, "/jobs/abc/download");
        assert_eq!(receipt.status, JobStatus::Queued);
    }

    #[test]
    fn test_process_request_without_output_name() {
        let request: ProcessRequest = serde_json::from_value(serde_json::json!({
            "operations": [{"type": "set_page_size", "size_identifier": "A4"}]
        }))
        .unwrap();
        assert_eq!(request.operations.len(), 1);
        assert!(request.output_filename.is_none());
    }
}

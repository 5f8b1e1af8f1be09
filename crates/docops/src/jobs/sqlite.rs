//! Job store persisted in SQLite.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::db::file_repo::{self, FileRow};
use crate::db::job_repo::{self, JobRow};
use crate::db::Database;
use crate::operation::DocumentFamily;

use super::error::StoreError;
use super::store::JobStore;
use super::types::{FileRecord, FileStatus, JobRecord, JobStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

const ACTIVE_STATUSES: [&str; 2] = ["queued", "processing"];

fn parse_job_status(s: &str, job_id: &str) -> JobStatus {
    match s {
        "queued" => JobStatus::Queued,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "unknown" => JobStatus::Unknown,
        other => {
            log::warn!(
                "Unknown job status '{}' for job {}, defaulting to Unknown",
                other,
                job_id
            );
            JobStatus::Unknown
        }
    }
}

fn parse_file_status(s: &str, file_id: &str) -> FileStatus {
    match s {
        "uploaded" => FileStatus::Uploaded,
        "queued" => FileStatus::Queued,
        "processing" => FileStatus::Processing,
        "completed" => FileStatus::Completed,
        "failed" => FileStatus::Failed,
        other => {
            log::warn!(
                "Unknown file status '{}' for file {}, defaulting to Uploaded",
                other,
                file_id
            );
            FileStatus::Uploaded
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

// ─── Conversions ────────────────────────────────────────────────────────────

fn job_to_row(job: &JobRecord) -> Result<JobRow, StoreError> {
    Ok(JobRow {
        id: job.job_id.clone(),
        file_id: job.file_id.clone(),
        source_path: path_to_string(&job.source_path),
        family: job.family.as_str().to_string(),
        status: job.status.as_str().to_string(),
        operations: serde_json::to_string(&job.operations)?,
        output_filename: job.output_filename.clone(),
        result_path: job.result_path.as_deref().map(path_to_string),
        output_dir: job.output_dir.as_deref().map(path_to_string),
        message: job.message.clone(),
        error: job.error.clone(),
        steps: serde_json::to_string(&job.steps)?,
        cleanup_scheduled: job.cleanup_scheduled,
        submitted_at: format_timestamp(job.submitted_at),
        completed_at: job.completed_at.map(format_timestamp),
    })
}

fn row_to_job(row: JobRow) -> Result<JobRecord, StoreError> {
    let family = DocumentFamily::parse(&row.family).ok_or_else(|| StoreError::Corrupt {
        id: row.id.clone(),
        reason: format!("unknown document family '{}'", row.family),
    })?;
    let status = parse_job_status(&row.status, &row.id);
    let steps = serde_json::from_str(&row.steps).unwrap_or_else(|e| {
        log::warn!("Job {} has unreadable step outcomes: {}", row.id, e);
        Vec::new()
    });

    Ok(JobRecord {
        operations: serde_json::from_str(&row.operations)?,
        file_id: row.file_id,
        source_path: PathBuf::from(row.source_path),
        family,
        status,
        output_filename: row.output_filename,
        result_path: row.result_path.map(PathBuf::from),
        output_dir: row.output_dir.map(PathBuf::from),
        message: row.message,
        error: row.error,
        steps,
        cleanup_scheduled: row.cleanup_scheduled,
        submitted_at: parse_timestamp(&row.submitted_at),
        completed_at: row.completed_at.as_deref().map(parse_timestamp),
        job_id: row.id,
    })
}

fn file_to_row(file: &FileRecord) -> FileRow {
    FileRow {
        id: file.file_id.clone(),
        original_filename: file.original_filename.clone(),
        stored_path: path_to_string(&file.stored_path),
        size_bytes: i64::try_from(file.size_bytes).unwrap_or(i64::MAX),
        mime_type: file.mime_type.clone(),
        status: file.status.as_str().to_string(),
        job_id: file.job_id.clone(),
        processed_path: file.processed_path.as_deref().map(path_to_string),
        uploaded_at: format_timestamp(file.uploaded_at),
    }
}

fn row_to_file(row: FileRow) -> FileRecord {
    FileRecord {
        status: parse_file_status(&row.status, &row.id),
        original_filename: row.original_filename,
        stored_path: PathBuf::from(row.stored_path),
        size_bytes: u64::try_from(row.size_bytes).unwrap_or(0),
        mime_type: row.mime_type,
        uploaded_at: parse_timestamp(&row.uploaded_at),
        job_id: row.job_id,
        processed_path: row.processed_path.map(PathBuf::from),
        file_id: row.id,
    }
}

// ─── SqliteJobStore ─────────────────────────────────────────────────────────

pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }
}

impl JobStore for SqliteJobStore {
    fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        job_repo::insert(&self.db, &job_to_row(job)?)?;
        Ok(())
    }

    fn update_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        job_repo::update(&self.db, &job_to_row(job)?)?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        job_repo::find_by_id(&self.db, job_id)?
            .map(row_to_job)
            .transpose()
    }

    fn has_active_job(&self, source_path: &Path) -> Result<bool, StoreError> {
        let count =
            job_repo::count_for_source(&self.db, &path_to_string(source_path), &ACTIVE_STATUSES)?;
        Ok(count > 0)
    }

    fn mark_cleanup_scheduled(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(job_repo::mark_cleanup_scheduled(&self.db, job_id)?)
    }

    fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        file_repo::insert(&self.db, &file_to_row(file))?;
        Ok(())
    }

    fn update_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        file_repo::update(&self.db, &file_to_row(file))?;
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(file_repo::find_by_id(&self.db, file_id)?.map(row_to_file))
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::Settings;
use crate::operation::{DocumentFamily, Operation};
use crate::sanitize;
use crate::storage;
use crate::worker::{PipelineTask, TaskQueue, TaskState};

use super::cleaner::JobCleaner;
use super::error::JobError;
use super::store::JobStore;
use super::types::{
    download_url, FileRecord, FileStatus, JobReceipt, JobRecord, JobStatus, ProcessRequest,
    ResultDownload, StatusSnapshot,
};

/// One-shot flags and the write guard for a single job.
#[derive(Default)]
struct JobGuard {
    reconciled: AtomicBool,
    cleanup: AtomicBool,
    write: Mutex<()>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn map_task_state(state: &TaskState) -> JobStatus {
    match state {
        TaskState::Pending => JobStatus::Queued,
        TaskState::Started => JobStatus::Processing,
        TaskState::Succeeded(_) => JobStatus::Completed,
        TaskState::Failed(_) => JobStatus::Failed,
        TaskState::Revoked | TaskState::Unknown => JobStatus::Unknown,
    }
}

fn default_message(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "Job is queued and waiting for a worker.",
        JobStatus::Processing => "Job is currently being processed.",
        JobStatus::Completed => "Processing completed successfully.",
        JobStatus::Failed => "Processing failed.",
        JobStatus::Unknown => "Job is in an unhandled queue state.",
    }
}

fn snapshot(job: &JobRecord) -> StatusSnapshot {
    StatusSnapshot {
        job_id: job.job_id.clone(),
        status: job.status,
        message: job
            .message
            .clone()
            .unwrap_or_else(|| default_message(job.status).to_string()),
        output_filename: job.output_filename.clone(),
        result_url: (job.status == JobStatus::Completed).then(|| download_url(&job.job_id)),
        error_details: job.error.clone(),
        steps: job.steps.clone(),
    }
}

/// Output name for a job: `<stem>_processed.<ext>` by default, and always
/// carrying the source family's extension.
fn output_filename(source_name: &str, requested: Option<&str>, family: DocumentFamily) -> String {
    let extension = family.extension();
    let stem_of = |name: &str| {
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("output")
            .to_string()
    };

    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        None => format!("{}_processed.{}", stem_of(source_name), extension),
        Some(name) => {
            let matches = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if matches {
                name.to_string()
            } else {
                format!("{}.{}", stem_of(name), extension)
            }
        }
    }
}

/// Drives jobs through `queued → processing → completed | failed` on top of
/// a [`TaskQueue`] and a [`JobStore`].
pub struct JobManager {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn TaskQueue>,
    cleaner: JobCleaner,
    upload_dir: PathBuf,
    max_upload_mb: u64,
    submit_lock: Mutex<()>,
    guards: Mutex<HashMap<String, Arc<JobGuard>>>,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn TaskQueue>,
        upload_dir: impl Into<PathBuf>,
        max_upload_mb: u64,
    ) -> Result<Self, JobError> {
        Ok(Self {
            store,
            queue,
            cleaner: JobCleaner::start()?,
            upload_dir: upload_dir.into(),
            max_upload_mb,
            submit_lock: Mutex::new(()),
            guards: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn JobStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Result<Self, JobError> {
        Self::new(
            store,
            queue,
            settings.upload_directory.clone(),
            settings.max_upload_mb,
        )
    }

    // ─── Uploads ────────────────────────────────────────────────────────────

    /// Validates and stores an uploaded source document.
    pub fn register_upload(&self, original_filename: &str, content: &[u8]) -> Result<FileRecord, JobError> {
        let original_filename = original_filename.trim();
        if original_filename.is_empty() {
            return Err(JobError::MissingFilename);
        }

        let extension = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let family = DocumentFamily::from_extension(&extension)
            .ok_or_else(|| JobError::UnsupportedFileType(format!(".{}", extension)))?;

        if content.is_empty() {
            return Err(JobError::EmptyUpload);
        }
        let size = content.len() as u64;
        if size > self.max_upload_mb.saturating_mul(1024 * 1024) {
            return Err(JobError::UploadTooLarge {
                size,
                limit_mb: self.max_upload_mb,
            });
        }

        let file_id = uuid::Uuid::new_v4().to_string();
        let stored_path = self
            .upload_dir
            .join(format!("{}.{}", file_id, family.extension()));
        storage::write_atomic(&stored_path, content)?;

        let record = FileRecord {
            mime_type: mime_guess::from_path(original_filename)
                .first_or_octet_stream()
                .to_string(),
            file_id,
            original_filename: original_filename.to_string(),
            stored_path,
            size_bytes: size,
            uploaded_at: Utc::now(),
            status: FileStatus::Uploaded,
            job_id: None,
            processed_path: None,
        };
        self.store.insert_file(&record)?;

        info!(
            "File uploaded: {} ({}, {} bytes)",
            record.file_id,
            sanitize::sanitize_filename(&record.original_filename),
            record.size_bytes
        );
        Ok(record)
    }

    pub fn file(&self, file_id: &str) -> Result<FileRecord, JobError> {
        self.store
            .get_file(file_id)?
            .ok_or_else(|| JobError::FileNotFound(file_id.to_string()))
    }

    pub fn job(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))
    }

    // ─── Submission ─────────────────────────────────────────────────────────

    /// Queues a run over a file on disk and returns the job id.
    pub fn submit(
        &self,
        file_path: &Path,
        family: DocumentFamily,
        operations: Vec<Operation>,
    ) -> Result<String, JobError> {
        let source_name = sanitize::redact_path(file_path);
        let output = output_filename(&source_name, None, family);
        self.enqueue(None, file_path, family, operations, output)
    }

    /// Queues a run over an uploaded file.
    pub fn submit_file(&self, file_id: &str, request: ProcessRequest) -> Result<JobReceipt, JobError> {
        let file = self.file(file_id)?;
        let family = DocumentFamily::from_path(&file.stored_path).ok_or_else(|| {
            JobError::UnsupportedFileType(sanitize::redact_path(&file.stored_path))
        })?;
        let output = output_filename(
            &file.original_filename,
            request.output_filename.as_deref(),
            family,
        );

        let job_id = self.enqueue(
            Some(file.file_id.clone()),
            &file.stored_path,
            family,
            request.operations,
            output,
        )?;
        Ok(JobReceipt::queued(&job_id, &file.file_id))
    }

    fn enqueue(
        &self,
        file_id: Option<String>,
        source: &Path,
        family: DocumentFamily,
        operations: Vec<Operation>,
        output_filename: String,
    ) -> Result<String, JobError> {
        let _submit = lock(&self.submit_lock, "Submit");

        if self.store.has_active_job(source)? {
            return Err(JobError::Conflict(sanitize::redact_path(source)));
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let mut job = JobRecord::new(
            &job_id,
            source,
            family,
            operations.clone(),
            &output_filename,
        );
        job.file_id = file_id;
        self.store.insert_job(&job)?;
        self.mirror_file(&job)?;

        let task = PipelineTask::new(source, family, operations, output_filename);
        if let Err(e) = self.queue.submit(&job_id, task) {
            warn!("Could not queue job {}: {}", job_id, e);
            job.status = JobStatus::Failed;
            job.message = Some(format!("Processing failed: {}", e));
            job.error = Some(e.to_string());
            job.completed_at = Some(Utc::now());
            self.store.update_job(&job)?;
            self.mirror_file(&job)?;
            return Err(e.into());
        }

        info!(
            "Processing job created: {} for {}",
            job_id,
            sanitize::redact_path(source)
        );
        Ok(job_id)
    }

    // ─── Status ─────────────────────────────────────────────────────────────

    /// Reconciles the job with the task queue and returns its state.
    ///
    /// Terminal side effects run once per job even under concurrent polling,
    /// and a late non-terminal observation never replaces a terminal status.
    pub fn get_status(&self, job_id: &str) -> Result<StatusSnapshot, JobError> {
        let job = self.job(job_id)?;
        if job.status.is_terminal() {
            return Ok(snapshot(&job));
        }

        let state = self.queue.poll(job_id);
        let finished = state.is_terminal() || matches!(state, TaskState::Unknown);

        let guard = self.guard(job_id);
        let job = {
            let _write = lock(&guard.write, "Job write");
            let mut job = self.job(job_id)?;
            self.reconcile(&guard, &mut job, state)?;
            job
        };

        if finished && (job.status.is_terminal() || job.status == JobStatus::Unknown) {
            self.release(&job);
        }
        Ok(snapshot(&job))
    }

    /// Applies one queue observation to the reloaded job. Runs under the
    /// job's write lock.
    fn reconcile(
        &self,
        guard: &JobGuard,
        job: &mut JobRecord,
        state: TaskState,
    ) -> Result<(), JobError> {
        let status = map_task_state(&state);

        if status.is_terminal() {
            if guard
                .reconciled
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
                && !job.status.is_terminal()
            {
                apply_terminal(job, state);
                self.store.update_job(job)?;
                self.mirror_file(job)?;
                info!("Job {} finished with status {}", job.job_id, job.status);
            }
            return Ok(());
        }

        if job.status.is_terminal() || guard.reconciled.load(Ordering::SeqCst) {
            return Ok(());
        }

        if job.status != status {
            debug!("Job {}: {} -> {}", job.job_id, job.status, status);
            job.status = status;
            job.message = Some(match status {
                JobStatus::Unknown => {
                    format!("Job is in an unhandled queue state: {}", state.name())
                }
                other => default_message(other).to_string(),
            });
            self.store.update_job(job)?;
            self.mirror_file(job)?;
        }
        Ok(())
    }

    /// Drops per-job bookkeeping once the store holds the job's final queue
    /// outcome. A completed job keeps its guard until cleanup is scheduled.
    fn release(&self, job: &JobRecord) {
        self.queue.forget(&job.job_id);
        if job.status == JobStatus::Completed && !job.cleanup_scheduled {
            return;
        }
        lock(&self.guards, "Job guards").remove(&job.job_id);
    }

    // ─── Results ────────────────────────────────────────────────────────────

    /// Reads the result of a completed job and schedules its cleanup.
    ///
    /// Cleanup is scheduled at most once. Retrieval after cleanup fails with
    /// [`JobError::ResultUnavailable`].
    pub fn retrieve_result(&self, job_id: &str) -> Result<ResultDownload, JobError> {
        let status = self.get_status(job_id)?;
        if status.status != JobStatus::Completed {
            return Err(JobError::NotReady {
                job_id: job_id.to_string(),
                status: status.status,
            });
        }

        let job = self.job(job_id)?;
        let Some(result_path) = job.result_path.clone() else {
            warn!("Job {} is completed but has no result path", job_id);
            return Err(JobError::ResultUnavailable(job_id.to_string()));
        };

        let content = match std::fs::read(&result_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Result {} of job {} is unavailable: {}",
                    sanitize::redact_path(&result_path),
                    job_id,
                    e
                );
                return Err(JobError::ResultUnavailable(job_id.to_string()));
            }
        };

        self.schedule_cleanup(&job);

        Ok(ResultDownload {
            filename: result_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| job.output_filename.clone()),
            content_type: mime_guess::from_path(&result_path)
                .first_or_octet_stream()
                .to_string(),
            content,
        })
    }

    fn schedule_cleanup(&self, job: &JobRecord) {
        let guard = self.guard(&job.job_id);
        if guard
            .cleanup
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Cleanup for job {} already scheduled", job.job_id);
            return;
        }

        match self.store.mark_cleanup_scheduled(&job.job_id) {
            Ok(true) => match &job.output_dir {
                Some(dir) => {
                    self.cleaner.schedule(dir.clone());
                }
                None => warn!(
                    "No output directory recorded for job {}, cleanup skipped",
                    job.job_id
                ),
            },
            Ok(false) => {
                debug!("Cleanup for job {} already scheduled or completed", job.job_id);
            }
            Err(e) => {
                warn!("Could not record cleanup for job {}: {}", job.job_id, e);
            }
        }
        lock(&self.guards, "Job guards").remove(&job.job_id);
    }

    // ─── Cancellation ───────────────────────────────────────────────────────

    /// Requests cancellation. A queued job is revoked, a running one fails
    /// at its next step boundary. Returns false when the job already ended.
    pub fn cancel(&self, job_id: &str) -> Result<bool, JobError> {
        let job = self.job(job_id)?;
        if job.status.is_terminal() {
            return Ok(false);
        }

        let revoked = self.queue.revoke(job_id);
        if revoked {
            info!("Cancellation requested for job {}", job_id);
            self.get_status(job_id)?;
        }
        Ok(revoked)
    }

    /// Stops the cleaner after it has removed everything scheduled.
    pub fn close(self) {
        self.cleaner.stop();
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn guard(&self, job_id: &str) -> Arc<JobGuard> {
        Arc::clone(
            lock(&self.guards, "Job guards")
                .entry(job_id.to_string())
                .or_default(),
        )
    }

    /// Copies the job's status onto its upload record, unless a newer job
    /// already owns that record.
    fn mirror_file(&self, job: &JobRecord) -> Result<(), JobError> {
        let Some(file_id) = &job.file_id else {
            return Ok(());
        };
        let Some(mut file) = self.store.get_file(file_id)? else {
            warn!("Job {} refers to missing file {}", job.job_id, file_id);
            return Ok(());
        };
        if file
            .job_id
            .as_deref()
            .is_some_and(|current| current != job.job_id)
            && job.status != JobStatus::Queued
        {
            return Ok(());
        }
        let Some(status) = FileStatus::mirror(job.status) else {
            return Ok(());
        };

        file.status = status;
        file.job_id = Some(job.job_id.clone());
        if status == FileStatus::Completed {
            file.processed_path = job.result_path.clone();
        }
        self.store.update_file(&file)?;
        Ok(())
    }
}

fn apply_terminal(job: &mut JobRecord, state: TaskState) {
    job.completed_at = Some(Utc::now());
    match state {
        TaskState::Succeeded(output) => {
            job.status = JobStatus::Completed;
            job.message = Some(output.message);
            job.result_path = Some(output.result_path);
            job.output_dir = Some(output.output_dir);
            job.steps = output.steps;
        }
        TaskState::Failed(error) => {
            job.status = JobStatus::Failed;
            job.message = Some(format!("Processing failed: {}", error));
            job.error = Some(error);
        }
        other => {
            warn!("Job {} reconciled from non-terminal state {}", job.job_id, other.name());
        }
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::StoreError;
use super::types::{FileRecord, JobRecord};

/// Persistence for job and upload records.
pub trait JobStore: Send + Sync {
    fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    fn update_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// True when a queued or processing job exists for `source_path`.
    fn has_active_job(&self, source_path: &Path) -> Result<bool, StoreError>;

    /// Sets the job's `cleanup_scheduled` flag. Returns true only for the
    /// call that set it.
    fn mark_cleanup_scheduled(&self, job_id: &str) -> Result<bool, StoreError>;

    fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError>;

    fn update_file(&self, file: &FileRecord) -> Result<(), StoreError>;

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError>;
}

#[derive(Default)]
struct Tables {
    jobs: HashMap<String, JobRecord>,
    files: HashMap<String, FileRecord>,
}

/// Process-local store. Records are lost when the process exits.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: RwLock<Tables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("MemoryJobStore read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("MemoryJobStore write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobStore for MemoryJobStore {
    fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.write().jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    fn update_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        let mut tables = self.write();
        match tables.jobs.get_mut(&job.job_id) {
            Some(existing) => {
                let cleanup_scheduled = existing.cleanup_scheduled;
                *existing = job.clone();
                existing.cleanup_scheduled = cleanup_scheduled;
            }
            None => log::warn!("update_job: job {} not found", job.job_id),
        }
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.read().jobs.get(job_id).cloned())
    }

    fn has_active_job(&self, source_path: &Path) -> Result<bool, StoreError> {
        Ok(self
            .read()
            .jobs
            .values()
            .any(|j| j.source_path == source_path && j.status.is_active()))
    }

    fn mark_cleanup_scheduled(&self, job_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.write();
        match tables.jobs.get_mut(job_id) {
            Some(job) if !job.cleanup_scheduled => {
                job.cleanup_scheduled = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        self.write().files.insert(file.file_id.clone(), file.clone());
        Ok(())
    }

    fn update_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        let mut tables = self.write();
        match tables.files.get_mut(&file.file_id) {
            Some(existing) => *existing = file.clone(),
            None => log::warn!("update_file: file {} not found", file.file_id),
        }
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.read().files.get(file_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobStatus;
    use crate::operation::DocumentFamily;

    #[test]
    fn test_active_job_detection() {
        let store = MemoryJobStore::new();
        let mut job = JobRecord::new("j1", "/tmp/a.pdf", DocumentFamily::Pdf, vec![], "a.pdf");
        store.insert_job(&job).unwrap();
        assert!(store.has_active_job(Path::new("/tmp/a.pdf")).unwrap());
        assert!(!store.has_active_job(Path::new("/tmp/b.pdf")).unwrap());

        job.status = JobStatus::Failed;
        store.update_job(&job).unwrap();
        assert!(!store.has_active_job(Path::new("/tmp/a.pdf")).unwrap());
    }

    #[test]
    fn test_cleanup_flag_survives_update() {
        let store = MemoryJobStore::new();
        let job = JobRecord::new("j1", "/tmp/a.pdf", DocumentFamily::Pdf, vec![], "a.pdf");
        store.insert_job(&job).unwrap();

        assert!(store.mark_cleanup_scheduled("j1").unwrap());
        store.update_job(&job).unwrap();
        assert!(store.get_job("j1").unwrap().unwrap().cleanup_scheduled);
        assert!(!store.mark_cleanup_scheduled("j1").unwrap());
        assert!(!store.mark_cleanup_scheduled("missing").unwrap());
    }
}

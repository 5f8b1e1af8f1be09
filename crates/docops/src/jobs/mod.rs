//! Job lifecycle on top of the task queue: uploads, submission, status
//! reconciliation, result retrieval and cleanup.

pub mod cleaner;
pub mod error;
pub mod manager;
pub mod sqlite;
pub mod store;
pub mod types;

pub use cleaner::JobCleaner;
pub use error::{JobError, StoreError};
pub use manager::JobManager;
pub use sqlite::SqliteJobStore;
pub use store::{JobStore, MemoryJobStore};
pub use types::{
    FileRecord, FileStatus, JobReceipt, JobRecord, JobStatus, ProcessRequest, ResultDownload,
    StatusSnapshot,
};

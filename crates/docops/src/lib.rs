pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod operation;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use config::{load_operations, load_settings, Settings};
pub use error::{ConfigError, DocopsError, Result, StorageError, TransformError, WorkerError};
pub use jobs::{JobError, JobManager, JobStatus, JobStore, MemoryJobStore, SqliteJobStore};
pub use operation::{DocumentFamily, Operation};
pub use pipeline::{Pipeline, PipelineError, RunControl, RunReport, StepStatus};
pub use registry::TransformRegistry;
pub use worker::{PipelineTask, TaskExecutor, TaskQueue, WorkerPool};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime settings for the job front end and worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Where accepted uploads are stored as `<file_id><ext>`.
    pub upload_directory: PathBuf,
    /// Root for per-job output directories.
    pub output_directory: PathBuf,
    /// Root for per-run pipeline workspaces.
    pub workspace_directory: PathBuf,
    pub max_upload_mb: u64,
    pub worker_count: usize,
    /// Per-task deadline, checked between pipeline steps.
    pub job_timeout_secs: Option<u64>,
    /// SQLite database for job records. In-memory records when unset.
    pub database_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("docops");

        Self {
            upload_directory: base.join("uploads"),
            output_directory: base.join("outputs"),
            workspace_directory: std::env::temp_dir(),
            max_upload_mb: 50,
            worker_count: num_cpus::get().max(1),
            job_timeout_secs: None,
            database_path: None,
        }
    }
}

impl Settings {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn job_timeout(&self) -> Option<std::time::Duration> {
        self.job_timeout_secs.map(std::time::Duration::from_secs)
    }
}

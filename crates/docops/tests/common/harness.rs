//! Test harness for isolated test execution.
//!
//! Every harness owns a temporary directory with separate input, output,
//! workspace and upload areas, so tests can assert that nothing leaks.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use docops::pipeline::NoopProgress;
use docops::{
    JobManager, JobStore, Operation, Pipeline, PipelineError, RunControl, RunReport,
    TaskExecutor, TransformRegistry, WorkerPool,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub upload_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.child("input").path().to_path_buf();
        let output_dir = temp_dir.child("output").path().to_path_buf();
        let workspace_dir = temp_dir.child("work").path().to_path_buf();
        let upload_dir = temp_dir.child("uploads").path().to_path_buf();

        for dir in [&input_dir, &output_dir, &workspace_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create directory");
        }

        Self {
            temp_dir,
            input_dir,
            output_dir,
            workspace_dir,
            upload_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let child = self.temp_dir.child("input").child(filename);
        child.write_binary(content).expect("Failed to write input file");
        child.path().to_path_buf()
    }

    pub fn write_operations(&self, filename: &str, content: &str) -> PathBuf {
        let child = self.temp_dir.child("input").child(filename);
        child.write_str(content).expect("Failed to write operations file");
        child.path().to_path_buf()
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::new(TransformRegistry::new()), &self.workspace_dir)
    }

    /// Runs `operations` over `source` into `output/<output_name>`.
    pub fn run(
        &self,
        source: &Path,
        operations: &[Operation],
        output_name: &str,
    ) -> Result<RunReport, PipelineError> {
        self.pipeline().run_for_path(
            source,
            operations,
            &self.output_path(output_name),
            &RunControl::new(),
            &NoopProgress,
        )
    }

    /// Number of entries left in the workspace root.
    pub fn workspace_entries(&self) -> usize {
        std::fs::read_dir(&self.workspace_dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }

    pub fn job_output_root(&self) -> PathBuf {
        self.temp_dir.child("job-outputs").path().to_path_buf()
    }

    /// A worker pool and a manager over `store`.
    pub fn job_stack(&self, store: Arc<dyn JobStore>, workers: usize) -> (Arc<WorkerPool>, JobManager) {
        let executor = Arc::new(TaskExecutor::new(self.pipeline(), self.job_output_root()));
        let pool = Arc::new(WorkerPool::new(executor, workers).expect("Failed to start workers"));
        let manager = JobManager::new(store, pool.clone(), &self.upload_dir, 50)
            .expect("Failed to create job manager");
        (pool, manager)
    }
}

/// Stops a pool built by [`TestHarness::job_stack`] once the manager is gone.
pub fn stop_pool(pool: Arc<WorkerPool>) {
    pool.shutdown();
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.wait();
    }
}

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, WorkerError};
use crate::operation::{DocumentFamily, Operation};
use crate::pipeline::{Pipeline, PipelineError, ProgressReporter, RunControl, StepOutcome};
use crate::sanitize;
use crate::storage;

/// A unit of work for the queue: one pipeline run over one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTask {
    pub source_path: PathBuf,
    pub family: DocumentFamily,
    pub operations: Vec<Operation>,
    /// Requested name of the final artifact; sanitized before use.
    pub output_filename: String,
}

impl PipelineTask {
    pub fn new(
        source_path: impl Into<PathBuf>,
        family: DocumentFamily,
        operations: Vec<Operation>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            family,
            operations,
            output_filename: output_filename.into(),
        }
    }
}

/// Return value of a successful task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub result_path: PathBuf,
    /// Directory owning `result_path`; removed when the result is cleaned up.
    pub output_dir: PathBuf,
    pub message: String,
    pub steps: Vec<StepOutcome>,
}

/// Runs a [`PipelineTask`] into its own output directory.
pub struct TaskExecutor {
    pipeline: Pipeline,
    output_root: PathBuf,
}

impl TaskExecutor {
    pub fn new(pipeline: Pipeline, output_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn execute(
        &self,
        task: &PipelineTask,
        control: &RunControl,
        progress: &dyn ProgressReporter,
    ) -> Result<TaskOutput, WorkerError> {
        if !task.source_path.is_file() {
            return Err(PipelineError::InputNotFound(task.source_path.clone()).into());
        }

        let extension = task.family.extension();
        let output_dir = self.create_output_dir(extension)?;
        let filename = sanitize::sanitize_output_filename(&task.output_filename, extension);
        let result_path = output_dir.join(&filename);

        match self.pipeline.run(
            &task.source_path,
            task.family,
            &task.operations,
            &result_path,
            control,
            progress,
        ) {
            Ok(report) => {
                info!(
                    "Task for {} finished: {}",
                    sanitize::redact_path(&task.source_path),
                    report.summary()
                );
                Ok(TaskOutput {
                    message: format!("Processed {} ({})", filename, report.summary()),
                    result_path: report.final_path,
                    output_dir,
                    steps: report.steps,
                })
            }
            Err(e) => {
                warn!("Task run failed, removing output directory: {}", e);
                storage::remove_dir_tolerant(&output_dir);
                Err(e.into())
            }
        }
    }

    fn create_output_dir(&self, extension: &str) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.output_root).map_err(|e| StorageError::CreateDirectory {
            path: self.output_root.clone(),
            source: e,
        })?;

        let dir = self
            .output_root
            .join(format!("docops_{}_out_{}", extension, uuid::Uuid::new_v4().simple()));
        std::fs::create_dir(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }
}

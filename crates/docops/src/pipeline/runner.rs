use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::operation::{DocumentFamily, Operation};
use crate::registry::TransformRegistry;
use crate::sanitize;
use crate::storage::{self, Workspace};

use super::context::{RunControl, RunState};
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};
use super::report::{RunReport, StepOutcome, StepStatus};

const WORKSPACE_PREFIX: &str = "docops_run_";

/// Applies an ordered operation list to one document.
///
/// Steps run strictly in order, each reading the previous step's artifact.
/// A step that cannot be resolved or fails leaves the artifact unchanged
/// and the run carries on.
pub struct Pipeline {
    registry: Arc<TransformRegistry>,
    workspace_root: PathBuf,
}

impl Pipeline {
    pub fn new(registry: Arc<TransformRegistry>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Like [`Pipeline::run`], deriving the family from the source extension.
    pub fn run_for_path(
        &self,
        source: &Path,
        operations: &[Operation],
        destination: &Path,
        control: &RunControl,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport, PipelineError> {
        let family = DocumentFamily::from_path(source).ok_or_else(|| {
            PipelineError::UnsupportedFormat(
                source
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            )
        })?;
        self.run(source, family, operations, destination, control, progress)
    }

    pub fn run(
        &self,
        source: &Path,
        family: DocumentFamily,
        operations: &[Operation],
        destination: &Path,
        control: &RunControl,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport, PipelineError> {
        let filename = sanitize::redact_path(source);
        let _pipeline_span = info_span!("pipeline",
            family = %family,
            filename = %filename,
            steps = operations.len(),
        )
        .entered();

        progress.report(ProgressEvent::Started {
            total_steps: operations.len(),
        });
        let result = self.execute(source, family, operations, destination, control, progress);

        match &result {
            Ok(report) => {
                info!(
                    "Finished {} -> {} ({})",
                    filename,
                    sanitize::redact_path(destination),
                    report.summary()
                );
                progress.report(ProgressEvent::Completed {
                    final_path: report.final_path.display().to_string(),
                });
            }
            Err(e) => {
                warn!("Run for {} failed: {}", filename, e);
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    fn execute(
        &self,
        source: &Path,
        family: DocumentFamily,
        operations: &[Operation],
        destination: &Path,
        control: &RunControl,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport, PipelineError> {
        if !source.is_file() {
            return Err(PipelineError::InputNotFound(source.to_path_buf()));
        }

        // Dropping the workspace on any early return removes it.
        let workspace = Workspace::create(&self.workspace_root, WORKSPACE_PREFIX)?;
        let extension = family.extension();

        let mut current = workspace.initial_path(extension);
        {
            let _step = info_span!("prepare_source").entered();
            storage::copy_artifact(source, &current)?;
        }

        let mut state = RunState::new();
        let mut steps = Vec::with_capacity(operations.len());

        for (offset, operation) in operations.iter().enumerate() {
            let index = offset + 1;
            control.check(index)?;

            let _step = info_span!("step", index, operation = %operation.kind).entered();
            progress.report(ProgressEvent::StepStarted {
                index,
                operation: operation.kind.clone(),
            });

            let step_output = workspace.step_output_path(index, &operation.kind, extension);
            let status = self.apply_step(family, operation, &current, &step_output, &mut state);

            if status != StepStatus::Applied && !step_output.is_file() {
                storage::copy_artifact(&current, &step_output)?;
            }
            current = step_output;

            let outcome = StepOutcome {
                index,
                operation: operation.kind.clone(),
                status,
            };
            progress.report(ProgressEvent::StepFinished(outcome.clone()));
            steps.push(outcome);
        }

        {
            let _step = info_span!("deliver").entered();
            storage::copy_artifact(&current, destination)?;
        }
        workspace.release();

        Ok(RunReport {
            final_path: destination.to_path_buf(),
            steps,
        })
    }

    fn apply_step(
        &self,
        family: DocumentFamily,
        operation: &Operation,
        input: &Path,
        output: &Path,
        state: &mut RunState,
    ) -> StepStatus {
        let Some(transform) = self.registry.resolve(family, &operation.kind) else {
            warn!(
                "Operation '{}' is not supported for {} documents, skipping",
                operation.kind, family
            );
            return StepStatus::NotPerformed;
        };

        let applied = panic::catch_unwind(AssertUnwindSafe(|| {
            transform.apply(operation, input, output, state)
        }));
        let result = match applied {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Operation '{}' panicked: {}", operation.kind, message);
                if output.exists() {
                    if let Err(e) = std::fs::remove_file(output) {
                        warn!("Could not discard partial output of '{}': {}", operation.kind, e);
                    }
                }
                return StepStatus::Failed {
                    reason: format!("transform panicked: {}", message),
                };
            }
        };

        match result {
            Ok(()) if output.is_file() => {
                debug!("Applied '{}'", operation.kind);
                StepStatus::Applied
            }
            Ok(()) => {
                warn!("Operation '{}' reported success but wrote no output", operation.kind);
                StepStatus::Failed {
                    reason: "transform produced no output".to_string(),
                }
            }
            Err(e) => {
                warn!("Operation '{}' failed: {}", operation.kind, e);
                StepStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

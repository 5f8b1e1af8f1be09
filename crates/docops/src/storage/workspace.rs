use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::StorageError;
use crate::sanitize;

/// A private temporary directory owned by exactly one pipeline run.
///
/// The directory is removed on [`Workspace::release`] or on drop, whichever
/// comes first. Removal tolerates a tree that is already partly or fully gone
/// and only logs other failures.
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    pub fn create(root: &Path, prefix: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|e| StorageError::CreateDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;

        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|e| StorageError::CreateWorkspace {
                root: root.to_path_buf(),
                source: e,
            })?;
        let path = dir.path().to_path_buf();

        log::debug!("Created workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the initial copy of the source document.
    pub fn initial_path(&self, extension: &str) -> PathBuf {
        self.path.join(format!("step_000_source.{}", extension))
    }

    /// Deterministic output path for step `step_index` (1-based).
    ///
    /// The zero-padded index makes names unique within the run even when the
    /// same operation type repeats.
    pub fn step_output_path(&self, step_index: usize, operation_type: &str, extension: &str) -> PathBuf {
        self.path.join(format!(
            "step_{:03}_{}.{}",
            step_index,
            sanitize::sanitize_operation_tag(operation_type),
            extension
        ))
    }

    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => log::debug!("Removed workspace {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Workspace {} was already removed", self.path.display());
            }
            Err(e) => {
                log::warn!(
                    "Could not remove temporary workspace {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}

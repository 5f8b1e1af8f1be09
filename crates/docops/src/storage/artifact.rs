use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Copies `src` to `dst`, creating the parent directory of `dst` if needed.
///
/// Last writer wins; callers never write the same path concurrently.
pub fn copy_artifact(src: &Path, dst: &Path) -> Result<(), StorageError> {
    ensure_parent(dst)?;
    std::fs::copy(src, dst).map_err(|e| StorageError::CopyFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Writes `content` to a sibling temp file and renames it over `path`,
/// so `path` either holds the complete content or is left untouched.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let partial = partial_path(path);

    let result = std::fs::File::create(&partial)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .map_err(|e| StorageError::WriteFile {
            path: partial.clone(),
            source: e,
        });
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    std::fs::rename(&partial, path).map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        StorageError::MoveFile {
            from: partial.clone(),
            to: path.to_path_buf(),
            source: e,
        }
    })
}

/// Removes a directory tree, treating an already missing tree as success.
/// Other failures are logged and reported as `false`.
pub fn remove_dir_tolerant(path: &Path) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("Could not remove directory {}: {}", path.display(), e);
            false
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

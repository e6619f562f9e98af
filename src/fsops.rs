//! Filesystem capability interface.
//!
//! Actions and the engine never call `std::fs` directly for mutation or
//! existence checks; they go through [`FileSystemOps`] so tests can
//! inject a journaling or failing implementation.

use std::path::{Path, PathBuf};

/// The filesystem operations the engine needs.
///
/// Mutating operations report plain success/failure; the caller decides
/// what a failure means (typically: leave the record unprocessed so a
/// later event retries).
pub trait FileSystemOps {
    fn path_exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    /// Final component of the path, lossily decoded.
    fn file_name(&self, path: &Path) -> Option<String>;

    fn move_file(&self, src: &Path, dst: &Path) -> bool;

    fn copy_file(&self, src: &Path, dst: &Path) -> bool;

    /// Immediate children of a directory. Used by overflow reconciliation.
    fn list_dir(&self, dir: &Path) -> Vec<PathBuf>;
}

/// [`FileSystemOps`] over the real filesystem.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystemOps for RealFileSystem {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    fn move_file(&self, src: &Path, dst: &Path) -> bool {
        match std::fs::rename(src, dst) {
            Ok(()) => {
                tracing::debug!("[fs] moved {} -> {}", src.display(), dst.display());
                true
            }
            Err(e) => {
                tracing::error!(
                    "[fs] move {} -> {} failed: {e}",
                    src.display(),
                    dst.display()
                );
                false
            }
        }
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> bool {
        match std::fs::copy(src, dst) {
            Ok(_) => {
                tracing::debug!("[fs] copied {} -> {}", src.display(), dst.display());
                true
            }
            Err(e) => {
                tracing::error!(
                    "[fs] copy {} -> {} failed: {e}",
                    src.display(),
                    dst.display()
                );
                false
            }
        }
    }

    fn list_dir(&self, dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .collect(),
            Err(e) => {
                tracing::warn!("[fs] cannot list {}: {e}", dir.display());
                Vec::new()
            }
        }
    }
}

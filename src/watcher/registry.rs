//! Watch registry: which directories are watched, and by which handle.
//!
//! Owns the handle↔path bookkeeping and the recursive walk-and-register
//! traversal. Every live handle maps to exactly one directory; both maps
//! are updated together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use super::error::WatchError;
use super::source::{NotificationSource, RawEvent, WatchHandle};

/// One watched directory and its recursion flag.
#[derive(Debug, Clone)]
pub struct WatchedDir {
    pub path: PathBuf,
    /// When set, subdirectories created later are registered on the fly.
    pub recursive: bool,
}

/// Registry of watched directories over a [`NotificationSource`].
///
/// A recursive registration registers every subdirectory individually,
/// each with its own handle, so the non-recursive OS primitive can cover
/// a whole tree.
pub struct PathWatchRegistry<S: NotificationSource> {
    source: S,
    by_handle: HashMap<WatchHandle, WatchedDir>,
    by_path: HashMap<PathBuf, WatchHandle>,
}

impl<S: NotificationSource> PathWatchRegistry<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            by_handle: HashMap::new(),
            by_path: HashMap::new(),
        }
    }

    /// Register a directory, and with `recursive` its whole subtree.
    ///
    /// Returns the handle of the root directory. Re-registration is
    /// idempotent: the existing watch is refreshed and its handle reused.
    pub fn register(&mut self, path: &Path, recursive: bool) -> Result<WatchHandle, WatchError> {
        if !path.exists() {
            return Err(WatchError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        if !path.is_dir() {
            return Err(WatchError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let root = self.register_single(path, recursive)?;
        if recursive {
            for dir in collect_dirs(path) {
                if dir == path {
                    continue;
                }
                // An unwatchable subdirectory must not invalidate the
                // root watch that is already live.
                if let Err(e) = self.register_single(&dir, true) {
                    tracing::warn!("[registry] cannot watch {}: {e}", dir.display());
                }
            }
        }
        Ok(root)
    }

    fn register_single(&mut self, path: &Path, recursive: bool) -> Result<WatchHandle, WatchError> {
        let handle = self.source.watch(path)?;

        if let Some(existing) = self.by_handle.get_mut(&handle) {
            tracing::debug!("[registry] refreshing watch on {}", path.display());
            existing.recursive = recursive || existing.recursive;
            return Ok(handle);
        }

        tracing::debug!("[registry] watching {}", path.display());
        self.by_handle.insert(
            handle,
            WatchedDir {
                path: path.to_path_buf(),
                recursive,
            },
        );
        self.by_path.insert(path.to_path_buf(), handle);
        Ok(handle)
    }

    /// Remove a watch. With `recursive`, also removes every watch whose
    /// directory is a descendant of `path`. Returns false if nothing was
    /// registered at `path`.
    pub fn unregister(&mut self, path: &Path, recursive: bool) -> bool {
        let root_removed = if let Some(handle) = self.by_path.remove(path) {
            self.by_handle.remove(&handle);
            self.source.unwatch(handle);
            true
        } else {
            false
        };

        if recursive {
            let descendants: Vec<PathBuf> = self
                .by_path
                .keys()
                .filter(|p| p.starts_with(path) && p.as_path() != path)
                .cloned()
                .collect();
            for dir in descendants {
                if let Some(handle) = self.by_path.remove(&dir) {
                    self.by_handle.remove(&handle);
                    self.source.unwatch(handle);
                }
            }
        }

        root_removed
    }

    /// Drop a single handle whose directory became inaccessible.
    pub fn drop_handle(&mut self, handle: WatchHandle) {
        if let Some(dir) = self.by_handle.remove(&handle) {
            tracing::debug!("[registry] dropping stale watch on {}", dir.path.display());
            self.by_path.remove(&dir.path);
            self.source.unwatch(handle);
        }
    }

    /// Resolve a handle back to its watched directory.
    pub fn resolve(&self, handle: WatchHandle) -> Option<&WatchedDir> {
        self.by_handle.get(&handle)
    }

    pub fn is_valid(&self, handle: WatchHandle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Watch entry registered exactly at `path`, if any.
    pub fn dir_at(&self, path: &Path) -> Option<&WatchedDir> {
        self.by_path.get(path).and_then(|h| self.by_handle.get(h))
    }

    /// Poll the underlying source for raw events.
    pub fn poll(&mut self, timeout: Duration) -> Vec<RawEvent> {
        self.source.poll(timeout)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

/// Depth-first list of `root` and every subdirectory under it.
///
/// Expressed as a plain traversal returning paths so registration stays
/// separable from the walk itself. Unreadable entries are reported and
/// skipped; the rest of the tree is still covered.
fn collect_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.path().to_path_buf()),
            Ok(_) => {}
            Err(e) => tracing::warn!("[registry] walk error under {}: {e}", root.display()),
        }
    }
    dirs
}

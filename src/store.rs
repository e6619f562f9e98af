//! Record store for files the engine has already ingested.
//!
//! The exists-check on this store is what makes Create processing
//! idempotent and what stops the engine's own move/copy writes from
//! being reprocessed as fresh creates. No locking: the engine loop is
//! single-threaded by design.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::classify::TypeCode;

/// One ingested file (or directory) and its cached classification.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub is_dir: bool,
    pub type_code: TypeCode,
}

impl FileRecord {
    pub fn new(path: PathBuf, file_name: String, is_dir: bool, type_code: TypeCode) -> Self {
        Self {
            path,
            file_name,
            is_dir,
            type_code,
        }
    }
}

/// Store of file records keyed by absolute path.
///
/// Never holds two records for the same path. Entries live for the
/// process lifetime; the set of distinct observed files bounds its size.
#[derive(Debug, Default)]
pub struct FileRecordStore {
    files: HashMap<PathBuf, FileRecord>,
}

impl FileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Insert or replace the record at its path.
    pub fn put(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    /// Remove a record. Removing an untracked path is a no-op.
    pub fn remove(&mut self, path: &Path) -> Option<FileRecord> {
        self.files.remove(path)
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    /// Paths of tracked records directly inside `dir`.
    pub fn children_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect()
    }
}

//! Notification source abstraction over the OS change-notification primitive.
//!
//! The engine never talks to `notify` directly. It polls a
//! [`NotificationSource`] which yields raw `(handle, kind, name)` events,
//! so tests can drive the whole pipeline from a scripted source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::error::WatchError;

/// Opaque token identifying one watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    /// Construct a handle from a raw id. Mainly useful for test sources.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Event kind as reported by the OS primitive, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Create,
    Delete,
    Modify,
    /// The OS dropped events for this directory; its state is unknown.
    Overflow,
}

/// One raw event keyed by watch handle.
///
/// `name` is the entry name relative to the watched directory. It is
/// `None` for overflow events, which concern the directory as a whole.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub handle: WatchHandle,
    pub kind: RawEventKind,
    pub name: Option<PathBuf>,
}

/// Low-level change-notification primitive.
///
/// One handle per watched directory; recursion is layered on top by the
/// registry, which registers every subdirectory individually.
pub trait NotificationSource {
    /// Start watching a single directory (non-recursive).
    ///
    /// Watching an already-watched directory refreshes the watch and
    /// returns the existing handle.
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle, WatchError>;

    /// Stop watching. Returns false if the handle was unknown.
    fn unwatch(&mut self, handle: WatchHandle) -> bool;

    /// Wait up to `timeout` for events, then drain whatever is queued.
    ///
    /// Returns an empty vec on timeout. Never blocks past `timeout`
    /// except to drain already-delivered events.
    fn poll(&mut self, timeout: Duration) -> Vec<RawEvent>;
}

/// [`NotificationSource`] backed by `notify::RecommendedWatcher`.
///
/// notify delivers events through a callback; we forward them into a
/// channel and drain it with `recv_timeout`, which keeps the engine loop
/// single-threaded and responsive to shutdown.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<notify::Event>>,
    by_path: HashMap<PathBuf, WatchHandle>,
    by_handle: HashMap<WatchHandle, PathBuf>,
    next_id: u64,
}

impl NotifySource {
    pub fn new() -> Result<Self, WatchError> {
        let (tx, rx) = unbounded();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver dropped means the source is shutting down.
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            rx,
            by_path: HashMap::new(),
            by_handle: HashMap::new(),
            next_id: 0,
        })
    }

    /// Map one notify event to raw events, tagging each path with the
    /// handle of its parent directory.
    fn convert(&self, event: notify::Event) -> Vec<RawEvent> {
        if event.need_rescan() {
            // Event queue overflowed. notify may not tell us which
            // directory was affected, so every watch is suspect.
            return self
                .by_handle
                .keys()
                .map(|&handle| RawEvent {
                    handle,
                    kind: RawEventKind::Overflow,
                    name: None,
                })
                .collect();
        }

        let kind = match event.kind {
            EventKind::Create(_) => RawEventKind::Create,
            EventKind::Remove(_) => RawEventKind::Delete,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => RawEventKind::Delete,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => RawEventKind::Create,
            EventKind::Modify(_) => RawEventKind::Modify,
            _ => return Vec::new(),
        };

        let mut raw = Vec::new();
        for path in &event.paths {
            let Some(parent) = path.parent() else {
                continue;
            };
            // Unknown parent means the watch was already removed; the
            // event is stale and can be dropped here.
            let Some(&handle) = self.by_path.get(parent) else {
                tracing::debug!("[source] dropping event for unwatched dir: {}", path.display());
                continue;
            };
            raw.push(RawEvent {
                handle,
                kind,
                name: path.file_name().map(PathBuf::from),
            });
        }
        raw
    }
}

impl NotificationSource for NotifySource {
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle, WatchError> {
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;

        if let Some(&existing) = self.by_path.get(dir) {
            return Ok(existing);
        }

        let handle = WatchHandle(self.next_id);
        self.next_id += 1;
        self.by_path.insert(dir.to_path_buf(), handle);
        self.by_handle.insert(handle, dir.to_path_buf());
        Ok(handle)
    }

    fn unwatch(&mut self, handle: WatchHandle) -> bool {
        let Some(path) = self.by_handle.remove(&handle) else {
            return false;
        };
        self.by_path.remove(&path);
        // The directory may already be gone; unwatch failure is expected then.
        if let Err(e) = self.watcher.unwatch(&path) {
            tracing::debug!("[source] unwatch {} failed: {e}", path.display());
        }
        true
    }

    fn poll(&mut self, timeout: Duration) -> Vec<RawEvent> {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => return Vec::new(),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("[source] event channel closed");
                return Vec::new();
            }
        };

        let mut raw = Vec::new();
        let mut handle_result = |res: notify::Result<notify::Event>, out: &mut Vec<RawEvent>| {
            match res {
                Ok(event) => out.extend(self.convert(event)),
                Err(e) => tracing::warn!("[source] backend error: {e}"),
            }
        };

        handle_result(first, &mut raw);
        while let Ok(res) = self.rx.try_recv() {
            handle_result(res, &mut raw);
        }
        raw
    }
}

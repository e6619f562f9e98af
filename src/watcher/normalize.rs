//! Turns raw source events into a typed notification stream.
//!
//! Resolves watch handles back to directories, joins entry names into
//! absolute paths, and keeps the registry honest: directories created
//! under a recursive watch are registered before the batch is returned,
//! and watches whose directory vanished are pruned.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::registry::PathWatchRegistry;
use super::source::{NotificationSource, RawEventKind};

/// Normalized filesystem change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Create,
    Delete,
    Modify,
    /// Events were lost for this directory; its contents must be
    /// reconciled before further incremental events are trusted.
    Overflow,
}

/// One normalized event with an absolute path.
///
/// For `Overflow` the path is the affected directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub path: PathBuf,
}

/// Poll the registry's source once and normalize everything it returned,
/// preserving arrival order.
pub fn drain<S: NotificationSource>(
    registry: &mut PathWatchRegistry<S>,
    timeout: Duration,
) -> Vec<Notification> {
    let raw = registry.poll(timeout);
    let mut out = Vec::with_capacity(raw.len());

    for event in raw {
        let Some(dir) = registry.resolve(event.handle) else {
            // The watch was removed after the event was queued.
            tracing::debug!("[normalize] dropping event for stale handle {:?}", event.handle);
            continue;
        };
        let dir_path = dir.path.clone();
        let recursive = dir.recursive;

        if event.kind == RawEventKind::Overflow {
            if !dir_path.is_dir() {
                // The directory vanished while events were being lost;
                // its watch can never fire meaningfully again.
                registry.drop_handle(event.handle);
                continue;
            }
            tracing::warn!("[normalize] overflow reported for {}", dir_path.display());
            out.push(Notification {
                kind: NotificationKind::Overflow,
                path: dir_path,
            });
            continue;
        }

        let Some(name) = event.name else {
            tracing::debug!("[normalize] event without entry name, dropped");
            continue;
        };
        let path = dir_path.join(name);

        let kind = match event.kind {
            RawEventKind::Create => NotificationKind::Create,
            RawEventKind::Delete => NotificationKind::Delete,
            RawEventKind::Modify => NotificationKind::Modify,
            RawEventKind::Overflow => unreachable!("handled above"),
        };

        match kind {
            // A directory born under a recursive watch must be covered
            // before we return, or creates inside it go unseen.
            NotificationKind::Create if recursive && path.is_dir() => {
                if let Err(e) = registry.register(&path, true) {
                    tracing::warn!(
                        "[normalize] failed to register new subdirectory {}: {e}",
                        path.display()
                    );
                }
            }
            // Deleting a watched directory invalidates its subtree's watches.
            NotificationKind::Delete if registry.is_watched(&path) => {
                registry.unregister(&path, true);
            }
            _ => {}
        }

        out.push(Notification { kind, path });
    }

    out
}

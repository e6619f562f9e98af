//! filewarden: watches directory trees, classifies changed files by
//! content, and dispatches configured move/copy/log actions.

pub mod actions;
pub mod classify;
pub mod config;
pub mod engine;
pub mod fsops;
pub mod logging;
pub mod rules;
pub mod store;
pub mod watcher;

pub use actions::{ActionExecutor, ActionOutcome};
pub use classify::{FileClassifier, TypeCode};
pub use config::{EngineConfig, Settings, WatchDirective};
pub use engine::{Engine, EngineStats};
pub use fsops::{FileSystemOps, RealFileSystem};
pub use rules::{ActionKind, ActionRule, RuleSet};
pub use store::{FileRecord, FileRecordStore};
pub use watcher::{
    Notification, NotificationKind, NotificationSource, NotifySource, PathWatchRegistry,
    WatchError, WatchHandle,
};

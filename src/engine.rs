//! The control loop: poll, normalize, classify, match, execute, sleep.
//!
//! Single-threaded and cooperative. One iteration polls the source with
//! a bounded timeout, drains the returned batch in arrival order, then
//! sleeps when idle. Cancellation is a shared flag checked only at
//! iteration boundaries, so the store and registry are never left
//! mid-update.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::actions::{ActionExecutor, ActionOutcome};
use crate::classify::{FileClassifier, TypeCode};
use crate::config::{EngineConfig, WatchDirective};
use crate::fsops::FileSystemOps;
use crate::rules::{ActionKind, RuleSet};
use crate::store::{FileRecord, FileRecordStore};
use crate::watcher::{
    Notification, NotificationKind, NotificationSource, PathWatchRegistry, normalize,
};
use crate::{debug_event, log_event};

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub watched_paths: usize,
    pub record_count: usize,
    pub notifications_processed: u64,
}

/// Watch-classify-act engine over injected source and filesystem.
pub struct Engine<S: NotificationSource, F: FileSystemOps> {
    registry: PathWatchRegistry<S>,
    classifier: FileClassifier,
    store: FileRecordStore,
    rules: RuleSet,
    executor: ActionExecutor<F>,
    cancel: Arc<AtomicBool>,
    poll_timeout: Duration,
    idle_sleep: Duration,
    processed: u64,
}

impl<S: NotificationSource, F: FileSystemOps> Engine<S, F> {
    pub fn new(source: S, fs: F, tuning: &EngineConfig) -> Self {
        Self {
            registry: PathWatchRegistry::new(source),
            classifier: FileClassifier::new(tuning.max_sniff_bytes),
            store: FileRecordStore::new(),
            rules: RuleSet::default(),
            executor: ActionExecutor::new(fs),
            cancel: Arc::new(AtomicBool::new(false)),
            poll_timeout: Duration::from_millis(tuning.poll_timeout_ms),
            idle_sleep: Duration::from_millis(tuning.idle_sleep_ms),
            processed: 0,
        }
    }

    /// Register the watch directives and install the rule set.
    ///
    /// A directive whose directory does not exist is reported and
    /// skipped; the engine keeps going with whatever it could register.
    pub fn start(&mut self, directives: &[WatchDirective], rules: RuleSet) {
        for directive in directives {
            match self.registry.register(&directive.path, directive.recursive) {
                Ok(_) => log_event!(
                    "engine",
                    "watching",
                    "{} (recursive: {})",
                    directive.path.display(),
                    directive.recursive
                ),
                Err(e) => tracing::error!(
                    "[engine] cannot watch {}: {e}",
                    directive.path.display()
                ),
            }
        }
        self.rules = rules;
        log_event!(
            "engine",
            "started",
            "{} directories, {} rules",
            self.registry.len(),
            self.rules.len()
        );
    }

    /// Shared cancellation flag. Setting it stops `run` at the next
    /// iteration boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Record tracked at `path`, if any.
    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        self.store.get(path)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            watched_paths: self.registry.len(),
            record_count: self.store.count(),
            notifications_processed: self.processed,
        }
    }

    /// Run until the cancellation flag is set.
    pub fn run(&mut self) {
        while !self.cancel.load(Ordering::Relaxed) {
            if self.tick() == 0 {
                std::thread::sleep(self.idle_sleep);
            }
        }
        log_event!("engine", "stopped", "{} notifications processed", self.processed);
    }

    /// One poll-and-drain cycle. Returns how many notifications were
    /// processed this cycle.
    pub fn tick(&mut self) -> usize {
        let batch = normalize::drain(&mut self.registry, self.poll_timeout);
        let count = batch.len();
        for notification in batch {
            self.process(notification);
            self.processed += 1;
        }
        count
    }

    fn process(&mut self, notification: Notification) {
        debug_event!(
            "engine",
            "notification_received",
            "{:?} {}",
            notification.kind,
            notification.path.display()
        );

        match notification.kind {
            NotificationKind::Create => self.on_create(&notification.path),
            NotificationKind::Modify => self.on_modify(&notification.path),
            NotificationKind::Delete => self.on_delete(&notification.path),
            NotificationKind::Overflow => self.reconcile(&notification.path),
        }
    }

    /// Ingest a newly observed path.
    ///
    /// Skips paths already in the store: that makes repeated creates
    /// idempotent and stops the engine's own move/copy writes from
    /// being reprocessed.
    fn on_create(&mut self, path: &Path) {
        if self.store.exists(path) {
            debug_event!("engine", "already_tracked", "{}", path.display());
            return;
        }
        if !self.executor.fs().path_exists(path) {
            debug_event!("engine", "vanished_before_ingest", "{}", path.display());
            return;
        }
        let Some(file_name) = self.executor.fs().file_name(path) else {
            tracing::warn!("[engine] no file name for {}", path.display());
            return;
        };

        if self.executor.fs().is_directory(path) {
            // Directories get a record for delete bookkeeping but no
            // classification or actions.
            self.store.put(FileRecord::new(
                path.to_path_buf(),
                file_name,
                true,
                TypeCode::UNK,
            ));
            return;
        }

        let type_code = self.classifier.classify(path);
        let record = FileRecord::new(path.to_path_buf(), file_name, false, type_code);
        self.dispatch(record, NotificationKind::Create);
    }

    /// Reclassify on modify: content may have changed, so the cached
    /// type is stale by definition.
    fn on_modify(&mut self, path: &Path) {
        if !self.executor.fs().path_exists(path) {
            self.store.remove(path);
            return;
        }
        if self.executor.fs().is_directory(path) {
            return;
        }

        let type_code = self.classifier.classify(path);
        let previous = self.store.remove(path);
        let record = match previous.clone() {
            Some(mut existing) => {
                existing.type_code = type_code;
                existing
            }
            None => {
                let Some(file_name) = self.executor.fs().file_name(path) else {
                    return;
                };
                FileRecord::new(path.to_path_buf(), file_name, false, type_code)
            }
        };
        if !self.dispatch(record, NotificationKind::Modify) {
            // The prior record must survive a failed action; the next
            // modify reclassifies and retries.
            if let Some(prior) = previous {
                self.store.put(prior);
            }
        }
    }

    fn on_delete(&mut self, path: &Path) {
        let removed = self.store.remove(path);
        let type_code = removed.map(|r| r.type_code).unwrap_or(TypeCode::UNK);

        let Some(rule) = self.rules.best_match(type_code.as_str(), NotificationKind::Delete)
        else {
            return;
        };
        log_event!(
            "engine",
            "rule_matched",
            "{} delete -> {:?}",
            type_code,
            rule.action
        );
        if let ActionOutcome::Failed { reason } = self.executor.execute(rule, path) {
            tracing::error!("[engine] delete action failed: {reason}");
        }
    }

    /// Match and execute, then update the store from the outcome.
    /// Returns false when the matched action failed.
    ///
    /// The record is only stored once the action (if any) succeeded, so
    /// a failed move/copy leaves the path unprocessed and a later event
    /// retries it.
    fn dispatch(&mut self, record: FileRecord, event: NotificationKind) -> bool {
        let Some(rule) = self.rules.best_match(record.type_code.as_str(), event) else {
            self.store.put(record);
            return true;
        };
        log_event!(
            "engine",
            "rule_matched",
            "{} {:?} -> {:?} (priority {})",
            record.type_code,
            event,
            rule.action,
            rule.priority
        );

        let action = rule.action;
        let outcome = self.executor.execute(rule, &record.path);
        match outcome {
            ActionOutcome::Success { destination } => {
                match (action, destination) {
                    (ActionKind::Move, Some(dest)) => {
                        // The file now lives at the destination; track it
                        // there with the classification already computed.
                        self.store.put(rebased(&record, dest));
                    }
                    (ActionKind::Copy, Some(dest)) => {
                        self.store.put(rebased(&record, dest));
                        self.store.put(record);
                    }
                    _ => self.store.put(record),
                }
                true
            }
            ActionOutcome::Failed { reason } => {
                tracing::error!(
                    "[engine] action failed for {}: {reason}",
                    record.path.display()
                );
                false
            }
        }
    }

    /// Overflow recovery: list the directory's immediate children and
    /// reconcile the store before trusting incremental events again.
    fn reconcile(&mut self, dir: &Path) {
        log_event!("engine", "overflow_detected", "rescanning {}", dir.display());

        let children = self.executor.fs().list_dir(dir);
        let present: HashSet<PathBuf> = children.iter().cloned().collect();

        let recursive = self.registry.dir_at(dir).is_some_and(|d| d.recursive);
        for child in &children {
            if self.executor.fs().is_directory(child) {
                if recursive && !self.registry.is_watched(child) {
                    // A subdirectory created while events were lost.
                    if let Err(e) = self.registry.register(child, true) {
                        tracing::warn!(
                            "[engine] cannot register {} during rescan: {e}",
                            child.display()
                        );
                    }
                }
                continue;
            }
            if !self.store.exists(child) {
                // Missed create: run it through the normal pipeline so
                // its action still happens.
                self.on_create(child);
            }
        }

        for tracked in self.store.children_of(dir) {
            if !present.contains(&tracked) {
                debug_event!("engine", "reconciled_removal", "{}", tracked.display());
                self.store.remove(&tracked);
            }
        }
    }
}

fn rebased(record: &FileRecord, dest: PathBuf) -> FileRecord {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.file_name.clone());
    FileRecord::new(dest, file_name, record.is_dir, record.type_code)
}

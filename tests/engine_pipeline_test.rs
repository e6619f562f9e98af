//! End-to-end pipeline tests over a scripted notification source and a
//! journaling filesystem, with real files in temp directories.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use filewarden::config::EngineConfig;
use filewarden::rules::{ActionKind, ActionRule};
use filewarden::watcher::{
    NotificationKind, NotificationSource, RawEvent, RawEventKind, WatchError, WatchHandle,
};
use filewarden::{Engine, FileSystemOps, RuleSet};

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

#[derive(Default)]
struct ScriptedState {
    next_id: u64,
    watched: HashMap<PathBuf, WatchHandle>,
    queue: VecDeque<Vec<RawEvent>>,
}

/// Notification source driven by the test: `watch` hands out handles,
/// `poll` pops one scripted batch per call.
#[derive(Clone, Default)]
struct ScriptedSource {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self::default()
    }

    fn handle_for(&self, dir: &Path) -> WatchHandle {
        *self
            .state
            .lock()
            .unwrap()
            .watched
            .get(dir)
            .unwrap_or_else(|| panic!("not watched: {}", dir.display()))
    }

    fn is_watching(&self, dir: &Path) -> bool {
        self.state.lock().unwrap().watched.contains_key(dir)
    }

    fn push_batch(&self, events: Vec<RawEvent>) {
        self.state.lock().unwrap().queue.push_back(events);
    }

    fn push(&self, dir: &Path, kind: RawEventKind, name: &str) {
        let handle = self.handle_for(dir);
        self.push_batch(vec![RawEvent {
            handle,
            kind,
            name: Some(PathBuf::from(name)),
        }]);
    }

    fn push_overflow(&self, dir: &Path) {
        let handle = self.handle_for(dir);
        self.push_batch(vec![RawEvent {
            handle,
            kind: RawEventKind::Overflow,
            name: None,
        }]);
    }
}

impl NotificationSource for ScriptedSource {
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle, WatchError> {
        let mut state = self.state.lock().unwrap();
        if let Some(&h) = state.watched.get(dir) {
            return Ok(h);
        }
        let h = WatchHandle::from_raw(state.next_id);
        state.next_id += 1;
        state.watched.insert(dir.to_path_buf(), h);
        Ok(h)
    }

    fn unwatch(&mut self, handle: WatchHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.watched.len();
        state.watched.retain(|_, &mut h| h != handle);
        state.watched.len() != before
    }

    fn poll(&mut self, _timeout: Duration) -> Vec<RawEvent> {
        self.state.lock().unwrap().queue.pop_front().unwrap_or_default()
    }
}

#[derive(Default)]
struct JournalState {
    moves: Vec<(PathBuf, PathBuf)>,
    copies: Vec<(PathBuf, PathBuf)>,
    fail_next_move: bool,
}

/// Real filesystem with an operation journal and move-failure injection.
#[derive(Clone, Default)]
struct JournalFs {
    state: Arc<Mutex<JournalState>>,
}

impl JournalFs {
    fn new() -> Self {
        Self::default()
    }

    fn moves(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.lock().unwrap().moves.clone()
    }

    fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.lock().unwrap().copies.clone()
    }

    fn fail_next_move(&self) {
        self.state.lock().unwrap().fail_next_move = true;
    }
}

impl FileSystemOps for JournalFs {
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
        let mut state = self.state.lock().unwrap();
        if state.fail_next_move {
            state.fail_next_move = false;
            return false;
        }
        if std::fs::rename(src, dst).is_err() {
            return false;
        }
        state.moves.push((src.to_path_buf(), dst.to_path_buf()));
        true
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> bool {
        if std::fs::copy(src, dst).is_err() {
            return false;
        }
        self.state
            .lock()
            .unwrap()
            .copies
            .push((src.to_path_buf(), dst.to_path_buf()));
        true
    }

    fn list_dir(&self, dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}

fn rule(
    file_type: &str,
    event: NotificationKind,
    action: ActionKind,
    destination: Option<&Path>,
    priority: i32,
) -> ActionRule {
    ActionRule {
        file_type: file_type.to_string(),
        event,
        action,
        destination: destination.map(Path::to_path_buf),
        priority,
    }
}

struct Fixture {
    _tmp: TempDir,
    inbox: PathBuf,
    outbox: PathBuf,
    source: ScriptedSource,
    fs: JournalFs,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let inbox = tmp.path().join("in");
        let outbox = tmp.path().join("out");
        std::fs::create_dir(&inbox).unwrap();
        std::fs::create_dir(&outbox).unwrap();
        Self {
            _tmp: tmp,
            inbox,
            outbox,
            source: ScriptedSource::new(),
            fs: JournalFs::new(),
        }
    }

    fn engine(&self, rules: Vec<ActionRule>, recursive: bool) -> Engine<ScriptedSource, JournalFs> {
        let mut engine = Engine::new(self.source.clone(), self.fs.clone(), &EngineConfig::default());
        engine.start(
            &[filewarden::WatchDirective {
                path: self.inbox.clone(),
                recursive,
            }],
            RuleSet::new(rules),
        );
        engine
    }

    fn drain(&self, engine: &mut Engine<ScriptedSource, JournalFs>) {
        // Each tick consumes one scripted batch; a few extra ticks are
        // harmless no-ops.
        for _ in 0..8 {
            engine.tick();
        }
    }
}

#[test]
fn create_moves_matching_file() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "jpg",
            NotificationKind::Create,
            ActionKind::Move,
            Some(&fx.outbox),
            1,
        )],
        false,
    );

    std::fs::write(fx.inbox.join("a.jpg"), JPEG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "a.jpg");
    fx.drain(&mut engine);

    assert_eq!(fx.fs.moves().len(), 1);
    assert!(fx.outbox.join("a.jpg").exists());
    assert!(!fx.inbox.join("a.jpg").exists());
    // The record follows the file to its destination.
    let record = engine.record(&fx.outbox.join("a.jpg")).unwrap();
    assert_eq!(record.type_code.as_str(), "jpg");
}

#[test]
fn duplicate_create_is_idempotent() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "jpg",
            NotificationKind::Create,
            ActionKind::Move,
            Some(&fx.outbox),
            1,
        )],
        false,
    );

    std::fs::write(fx.inbox.join("a.jpg"), JPEG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "a.jpg");
    fx.source.push(&fx.inbox, RawEventKind::Create, "a.jpg");
    fx.drain(&mut engine);

    assert_eq!(fx.fs.moves().len(), 1);
    assert_eq!(engine.stats().record_count, 1);
    assert_eq!(engine.stats().notifications_processed, 2);
}

#[test]
fn move_does_not_retrigger_on_destination_create() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "jpg",
            NotificationKind::Create,
            ActionKind::Move,
            Some(&fx.outbox),
            1,
        )],
        false,
    );
    // Destination is watched too, as in a real setup where /out is a
    // child of a watched tree.
    engine.start(
        &[filewarden::WatchDirective {
            path: fx.outbox.clone(),
            recursive: false,
        }],
        RuleSet::new(vec![rule(
            "jpg",
            NotificationKind::Create,
            ActionKind::Move,
            Some(&fx.outbox),
            1,
        )]),
    );

    std::fs::write(fx.inbox.join("a.jpg"), JPEG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "a.jpg");
    fx.drain(&mut engine);
    assert_eq!(fx.fs.moves().len(), 1);

    // The OS now reports the engine's own write as a fresh create.
    fx.source.push(&fx.outbox, RawEventKind::Create, "a.jpg");
    fx.drain(&mut engine);

    assert_eq!(fx.fs.moves().len(), 1);
    assert!(fx.outbox.join("a.jpg").exists());
}

#[test]
fn lowest_priority_value_wins_across_destinations() {
    let fx = Fixture::new();
    let slow = fx.outbox.join("slow");
    let fast = fx.outbox.join("fast");
    std::fs::create_dir(&slow).unwrap();
    std::fs::create_dir(&fast).unwrap();

    let mut engine = fx.engine(
        vec![
            rule("jpg", NotificationKind::Create, ActionKind::Move, Some(&slow), 5),
            rule("jpg", NotificationKind::Create, ActionKind::Move, Some(&fast), 1),
        ],
        false,
    );

    std::fs::write(fx.inbox.join("a.jpg"), JPEG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "a.jpg");
    fx.drain(&mut engine);

    assert!(fast.join("a.jpg").exists());
    assert!(!slow.join("a.jpg").exists());
}

#[test]
fn failed_move_leaves_path_unprocessed_for_retry() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "txt",
            NotificationKind::Create,
            ActionKind::Move,
            Some(&fx.outbox),
            1,
        )],
        false,
    );

    std::fs::write(fx.inbox.join("notes.txt"), b"plain text contents").unwrap();
    fx.fs.fail_next_move();
    fx.source.push(&fx.inbox, RawEventKind::Create, "notes.txt");
    fx.drain(&mut engine);

    // Not marked processed: no record anywhere, file still in place.
    assert_eq!(engine.stats().record_count, 0);
    assert!(fx.inbox.join("notes.txt").exists());

    // The next observed event retries and succeeds.
    fx.source.push(&fx.inbox, RawEventKind::Create, "notes.txt");
    fx.drain(&mut engine);

    assert!(fx.outbox.join("notes.txt").exists());
    assert_eq!(engine.stats().record_count, 1);
}

#[test]
fn failed_modify_action_preserves_existing_record() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![
            rule("txt", NotificationKind::Create, ActionKind::Copy, Some(&fx.outbox), 1),
            rule("txt", NotificationKind::Modify, ActionKind::Move, Some(&fx.outbox), 1),
        ],
        false,
    );

    let path = fx.inbox.join("notes.txt");
    std::fs::write(&path, b"first revision").unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "notes.txt");
    fx.drain(&mut engine);
    assert!(engine.record(&path).is_some());
    assert_eq!(fx.fs.copies().len(), 1);

    std::fs::write(&path, b"second revision").unwrap();
    fx.fs.fail_next_move();
    fx.source.push(&fx.inbox, RawEventKind::Modify, "notes.txt");
    fx.drain(&mut engine);

    // The record survives the failed action.
    assert!(engine.record(&path).is_some());

    // So a duplicate create stays suppressed: no second copy.
    fx.source.push(&fx.inbox, RawEventKind::Create, "notes.txt");
    fx.drain(&mut engine);
    assert_eq!(fx.fs.copies().len(), 1);

    // And the next modify retries the move and succeeds.
    fx.source.push(&fx.inbox, RawEventKind::Modify, "notes.txt");
    fx.drain(&mut engine);
    assert!(fx.outbox.join("notes.txt").exists());
    assert!(!path.exists());
}

#[test]
fn overflow_forces_reconciliation() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "txt",
            NotificationKind::Create,
            ActionKind::Copy,
            Some(&fx.outbox),
            1,
        )],
        false,
    );

    // One file the engine knows about, which then vanishes silently.
    std::fs::write(fx.inbox.join("gone.txt"), b"soon removed").unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "gone.txt");
    fx.drain(&mut engine);
    assert!(engine.record(&fx.inbox.join("gone.txt")).is_some());
    std::fs::remove_file(fx.inbox.join("gone.txt")).unwrap();

    // One file that appeared while events were being lost.
    std::fs::write(fx.inbox.join("missed.txt"), b"created during overflow").unwrap();

    fx.source.push_overflow(&fx.inbox);
    fx.drain(&mut engine);

    // The missed create still got its action; the vanished record is gone.
    assert!(fx.outbox.join("missed.txt").exists());
    assert!(engine.record(&fx.inbox.join("missed.txt")).is_some());
    assert!(engine.record(&fx.inbox.join("gone.txt")).is_none());
}

#[test]
fn late_subdirectory_is_registered_under_recursive_watch() {
    let fx = Fixture::new();
    let mut engine = fx.engine(Vec::new(), true);

    // Subdirectory created after the initial registration.
    let sub = fx.inbox.join("sub");
    std::fs::create_dir(&sub).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "sub");
    fx.drain(&mut engine);

    assert!(fx.source.is_watching(&sub));

    // Files inside it are now visible.
    std::fs::write(sub.join("new.txt"), b"fresh file").unwrap();
    fx.source.push(&sub, RawEventKind::Create, "new.txt");
    fx.drain(&mut engine);

    let record = engine.record(&sub.join("new.txt")).unwrap();
    assert_eq!(record.type_code.as_str(), "txt");
}

#[test]
fn modify_reclassifies_cached_type() {
    let fx = Fixture::new();
    let mut engine = fx.engine(Vec::new(), false);

    // Unknown binary content first.
    let path = fx.inbox.join("f.bin");
    std::fs::write(&path, [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "f.bin");
    fx.drain(&mut engine);
    assert_eq!(engine.record(&path).unwrap().type_code.as_str(), "UNK");

    // Content changes; the stale UNK must not be reused.
    std::fs::write(&path, PNG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Modify, "f.bin");
    fx.drain(&mut engine);
    assert_eq!(engine.record(&path).unwrap().type_code.as_str(), "png");
}

#[test]
fn delete_always_removes_record() {
    let fx = Fixture::new();
    let mut engine = fx.engine(Vec::new(), false);

    std::fs::write(fx.inbox.join("d.txt"), b"to be deleted").unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "d.txt");
    fx.drain(&mut engine);
    assert_eq!(engine.stats().record_count, 1);

    std::fs::remove_file(fx.inbox.join("d.txt")).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Delete, "d.txt");
    fx.drain(&mut engine);
    assert_eq!(engine.stats().record_count, 0);

    // Deleting an untracked path is a harmless no-op.
    fx.source.push(&fx.inbox, RawEventKind::Delete, "never-seen.txt");
    fx.drain(&mut engine);
    assert_eq!(engine.stats().record_count, 0);
}

#[test]
fn stale_handle_events_are_dropped() {
    let fx = Fixture::new();
    let mut engine = fx.engine(Vec::new(), false);

    fx.source.push_batch(vec![RawEvent {
        handle: WatchHandle::from_raw(9999),
        kind: RawEventKind::Create,
        name: Some(PathBuf::from("ghost.txt")),
    }]);
    fx.drain(&mut engine);

    assert_eq!(engine.stats().notifications_processed, 0);
    assert_eq!(engine.stats().record_count, 0);
}

#[test]
fn copy_records_both_source_and_destination() {
    let fx = Fixture::new();
    let mut engine = fx.engine(
        vec![rule(
            "png",
            NotificationKind::Create,
            ActionKind::Copy,
            Some(&fx.outbox),
            1,
        )],
        false,
    );

    std::fs::write(fx.inbox.join("p.png"), PNG_MAGIC).unwrap();
    fx.source.push(&fx.inbox, RawEventKind::Create, "p.png");
    fx.drain(&mut engine);

    assert_eq!(fx.fs.copies().len(), 1);
    assert!(engine.record(&fx.inbox.join("p.png")).is_some());
    assert!(engine.record(&fx.outbox.join("p.png")).is_some());
}

use std::{
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use stickynotes::{
    list_backups, JsonFileBackend, MemoryBackend, NotePatch, NoteStore, PersistedState,
    PersistentStore, Result, SettingsManager, SettingsPatch, StateBackend, StickyError,
};
use tempfile::TempDir;

fn open(dir: &TempDir) -> (Arc<PersistentStore>, NoteStore, SettingsManager) {
    let backend = JsonFileBackend::new(dir.path().join("stickynotes.json"));
    let store = Arc::new(PersistentStore::open(Box::new(backend)).unwrap());
    let settings = SettingsManager::new(Arc::clone(&store));
    let notes = NoteStore::new(Arc::clone(&store), settings.clone());
    (store, notes, settings)
}

/// Backend whose writes can be made to fail.
struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<AtomicBool>,
}

impl StateBackend for FlakyBackend {
    fn load(&self) -> Result<Option<PersistedState>> {
        self.inner.load()
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StickyError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(state)
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn notes_and_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let (_, notes, settings) = open(&dir);
        settings
            .update(SettingsPatch {
                theme: Some("light".into()),
                ..Default::default()
            })
            .unwrap();
        notes.create(NotePatch::title("Persisted")).unwrap().id
    };

    let (_, notes, settings) = open(&dir);
    assert_eq!(notes.get(&id).unwrap().unwrap().title, "Persisted");
    assert_eq!(settings.get().unwrap().theme, "light");
}

#[test]
fn missing_file_and_fields_are_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    let (_, notes, settings) = open(&dir);
    assert!(notes.get_all().unwrap().is_empty());
    assert_eq!(settings.get().unwrap().version_history_length, 50);

    fs::write(
        dir.path().join("stickynotes.json"),
        r#"{"settings":{"fontSize":20}}"#,
    )
    .unwrap();
    let (_, notes, settings) = open(&dir);
    let settings = settings.get().unwrap();
    assert!(notes.get_all().unwrap().is_empty());
    assert_eq!(settings.font_size, 20);
    assert_eq!(settings.default_note_color, "#111214");
}

#[test]
fn partial_note_record_loads_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("stickynotes.json"),
        r#"{"notes":[{"id":"a","title":"kept","body":"x"}]}"#,
    )
    .unwrap();

    let (_, notes, _) = open(&dir);
    let note = notes.get("a").unwrap().unwrap();
    assert_eq!(note.title, "kept");
    assert_eq!(note.body, "x");
    assert_eq!(note.color, "#111214");
    assert_eq!(note.accent, "#00E5FF");
    assert!(!note.pinned && !note.locked);
    assert!(note.versions.is_empty());

    let updated = notes.update("a", NotePatch::body("y")).unwrap().unwrap();
    assert_eq!(updated.versions.len(), 1);
}

#[test]
fn store_file_is_camel_case_json() {
    let dir = tempfile::tempdir().unwrap();
    let (_, notes, _) = open(&dir);
    notes.create(NotePatch::title("x")).unwrap();

    let raw = fs::read_to_string(dir.path().join("stickynotes.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value["notes"][0]["createdAt"].is_string());
    assert_eq!(value["settings"]["versionHistoryLength"], 50);
}

#[test]
fn failed_write_keeps_last_good_state_and_allows_retry() {
    let failing = Arc::new(AtomicBool::new(false));
    let backend = FlakyBackend {
        inner: MemoryBackend::new(),
        failing: Arc::clone(&failing),
    };
    let store = Arc::new(PersistentStore::open(Box::new(backend)).unwrap());
    let settings = SettingsManager::new(Arc::clone(&store));
    let notes = NoteStore::new(Arc::clone(&store), settings);

    let note = notes.create(NotePatch::title("Original")).unwrap();

    failing.store(true, Ordering::SeqCst);
    let err = notes
        .update(&note.id, NotePatch::title("Lost"))
        .unwrap_err();
    assert!(matches!(err, StickyError::StorageFailure { .. }));
    assert!(matches!(
        notes.create(NotePatch::default()),
        Err(StickyError::StorageFailure { .. })
    ));

    let current = notes.get(&note.id).unwrap().unwrap();
    assert_eq!(current.title, "Original");
    assert!(current.versions.is_empty());
    assert_eq!(notes.get_all().unwrap().len(), 1);

    failing.store(false, Ordering::SeqCst);
    let retried = notes
        .update(&note.id, NotePatch::title("Saved"))
        .unwrap()
        .unwrap();
    assert_eq!(retried.title, "Saved");
    assert_eq!(retried.versions.len(), 1);
}

#[test]
fn backups_are_pruned_to_max() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("backups");
    let (store, notes, _) = open(&dir);
    notes.create(NotePatch::title("backed up")).unwrap();

    for _ in 0..5 {
        store.create_backup(&backup_dir, 3).unwrap();
    }
    assert_eq!(list_backups(&backup_dir).len(), 3);
}

#[test]
fn restore_replaces_whole_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("backups");
    let (store, notes, _) = open(&dir);

    let kept = notes.create(NotePatch::title("before backup")).unwrap();
    let backup = store.create_backup(&backup_dir, 10).unwrap();

    notes.delete(&kept.id).unwrap();
    notes.create(NotePatch::title("after backup")).unwrap();

    assert_eq!(store.restore_backup(&backup).unwrap(), 1);
    let all = notes.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, kept.id);

    // restored state was written through to the store file
    let (_, reopened, _) = open(&dir);
    assert_eq!(reopened.get_all().unwrap()[0].id, kept.id);
}

#[test]
fn restore_of_missing_backup_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _, _) = open(&dir);
    assert!(store
        .restore_backup(&dir.path().join("nope.json"))
        .is_err());
}

#[test]
fn memory_backend_seeds_initial_state() {
    let mut seeded = PersistedState::default();
    seeded.settings.theme = "light".to_string();
    let store = Arc::new(
        PersistentStore::open(Box::new(MemoryBackend::with_state(seeded))).unwrap(),
    );

    let settings = SettingsManager::new(store);
    assert_eq!(settings.get().unwrap().theme, "light");
}

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{load_state_from_file, Note, Result, Settings, StickyError};

/// Everything the app persists: one complete snapshot per write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub notes: Vec<Note>,
    pub settings: Settings,
}

/// Durable key/value storage for the persisted snapshot.
pub trait StateBackend: Send + Sync {
    /// Reads the last saved snapshot, or `None` on first launch.
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Replaces the saved snapshot with `state`.
    fn save(&self, state: &PersistedState) -> Result<()>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Stores the snapshot as one pretty-printed JSON file.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            debug!(
                "Store file does not exist yet, starting from defaults: {}",
                self.path.display()
            );
            return Ok(None);
        }
        load_state_from_file(&self.path).map(Some)
    }

    /// Saves using atomic operations to prevent data corruption
    fn save(&self, state: &PersistedState) -> Result<()> {
        write_json_atomically(&self.path, state)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the snapshot in memory only. Used for embedding and tests.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<Option<PersistedState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            saved: Mutex::new(Some(state)),
        }
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(lock(&self.saved)?.clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *lock(&self.saved)? = Some(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// The only shared mutable resource. Holds the last snapshot that was
/// successfully persisted; every mutation is a full read-modify-persist cycle.
pub struct PersistentStore {
    backend: Box<dyn StateBackend>,
    state: Mutex<PersistedState>,
}

impl PersistentStore {
    /// Opens the store, reading the backend once. A missing snapshot yields
    /// an empty note list and default settings.
    pub fn open(backend: Box<dyn StateBackend>) -> Result<Self> {
        info!("Opening persistent store at {}", backend.describe());
        let state = backend.load()?.unwrap_or_default();
        info!(
            "Loaded {} notes from {}",
            state.notes.len(),
            backend.describe()
        );

        Ok(Self {
            backend,
            state: Mutex::new(state),
        })
    }

    /// Store that lives in memory only.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            state: Mutex::new(PersistedState::default()),
        }
    }

    /// Runs `f` against the current snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&PersistedState) -> T) -> Result<T> {
        let guard = lock(&self.state)?;
        Ok(f(&guard))
    }

    /// Applies `f` to a copy of the current snapshot and persists it.
    ///
    /// When `f` returns `None` nothing changed and nothing is written. When
    /// the write fails the in-memory snapshot is left as it was and
    /// `StorageFailure` is returned, so the caller may retry.
    pub fn transact<T>(&self, f: impl FnOnce(&mut PersistedState) -> Option<T>) -> Result<Option<T>> {
        let mut guard = lock(&self.state)?;
        let mut next = guard.clone();

        let Some(out) = f(&mut next) else {
            trace!("Transaction made no changes, skipping write");
            return Ok(None);
        };

        self.backend.save(&next).map_err(|e| {
            error!("Failed to persist store to {}: {}", self.backend.describe(), e);
            StickyError::StorageFailure {
                message: e.to_string(),
            }
        })?;

        *guard = next;
        Ok(Some(out))
    }

    /// Full copy of the current snapshot.
    pub fn snapshot(&self) -> Result<PersistedState> {
        self.read(|state| state.clone())
    }

    /// Writes the current snapshot into `backup_dir` and prunes the directory
    /// down to the newest `max_backups` backups.
    pub fn create_backup(&self, backup_dir: &Path, max_backups: usize) -> Result<PathBuf> {
        if !backup_dir.exists() {
            fs::create_dir_all(backup_dir).map_err(|e| {
                error!("Failed to create backup directory: {}", e);
                StickyError::DirectoryError {
                    path: backup_dir.to_path_buf(),
                }
            })?;
        }

        // Generate timestamped filename for the backup
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%6f").to_string();
        let mut backup_path = backup_dir.join(format!("stickynotes_backup_{}.json", timestamp));
        let mut suffix = 1;
        while backup_path.exists() {
            backup_path = backup_dir.join(format!("stickynotes_backup_{}_{}.json", timestamp, suffix));
            suffix += 1;
        }

        let snapshot = self.snapshot()?;
        write_json_atomically(&backup_path, &snapshot)?;
        info!(
            "Backup of {} notes created at {}",
            snapshot.notes.len(),
            backup_path.display()
        );

        if let Err(e) = cleanup_old_backups(backup_dir, max_backups) {
            warn!("Failed to clean up old backups: {}", e);
        }

        Ok(backup_path)
    }

    /// Replaces the whole snapshot with the contents of a backup file.
    pub fn restore_backup(&self, backup_file: &Path) -> Result<usize> {
        if !backup_file.exists() {
            return Err(StickyError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("backup file not found: {}", backup_file.display()),
            )));
        }

        let restored = load_state_from_file(backup_file)?;
        let count = restored.notes.len();
        self.transact(move |state| {
            *state = restored;
            Some(())
        })?;

        info!("Restored {} notes from {}", count, backup_file.display());
        Ok(count)
    }
}

/// Backup files in `backup_dir`, oldest first.
pub fn list_backups(backup_dir: &Path) -> Vec<PathBuf> {
    let mut backups: Vec<PathBuf> = WalkDir::new(backup_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("stickynotes_backup_") && n.ends_with(".json"))
        })
        .collect();

    // timestamped names sort chronologically
    backups.sort();
    backups
}

fn cleanup_old_backups(backup_dir: &Path, max_backups: usize) -> Result<()> {
    let backups = list_backups(backup_dir);
    if backups.len() <= max_backups {
        return Ok(());
    }

    let excess = backups.len() - max_backups;
    for path in backups.into_iter().take(excess) {
        debug!("Removing old backup: {}", path.display());
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directory: {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create directory {}: {}", parent.display(), e);
                StickyError::Io(e)
            })?;
        }
    }

    // Create a temporary file in the same directory (for atomic operation)
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file: {}", e);
        StickyError::Io(e)
    })?;

    trace!("Serializing snapshot to JSON");
    let json = serde_json::to_string_pretty(value)?;

    temp_file.write_all(json.as_bytes())?;
    temp_file.flush()?;

    // Atomically move the temporary file to the target location
    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist file {}: {}", path.display(), e.error);
        StickyError::Io(e.error)
    })?;

    trace!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| StickyError::LockAcquisitionFailed {
        message: "Failed to acquire lock on store snapshot".to_string(),
    })
}

//! Note Store: the only code that reads or changes notes.
//!
//! Every mutation goes through [`PersistentStore::transact`], so the collection
//! on disk and in memory is always one complete snapshot.
use std::{collections::HashSet, sync::Arc};

use log::{debug, info, trace, warn};

use crate::{
    ExportFormat, ImportedNote, Note, NotePatch, PersistentStore, Result, SettingsManager,
    StickyError,
};

/// Manages the notes collection.
#[derive(Clone)]
pub struct NoteStore {
    store: Arc<PersistentStore>,
    settings: SettingsManager,
}

impl NoteStore {
    pub fn new(store: Arc<PersistentStore>, settings: SettingsManager) -> Self {
        Self { store, settings }
    }

    /// Creates a note from a partial, appends it and persists before returning.
    pub fn create(&self, patch: NotePatch) -> Result<Note> {
        let default_color = self.settings.default_note_color()?;
        let note = Note::new(patch, &default_color);
        let created = note.clone();

        self.store.transact(move |state| {
            state.notes.push(note);
            Some(())
        })?;

        info!("Created note {}", created.id);
        Ok(created)
    }

    /// Retrieves a note by its ID
    pub fn get(&self, id: &str) -> Result<Option<Note>> {
        self.store
            .read(|state| state.notes.iter().find(|n| n.id == id).cloned())
    }

    /// All notes in persisted order.
    pub fn get_all(&self) -> Result<Vec<Note>> {
        self.store.read(|state| state.notes.clone())
    }

    /// Merges `patch` into the note with `id` and returns the updated note.
    ///
    /// Unknown ids are a no-op returning `None`. See [`Note::apply`] for the
    /// versioning and `updatedAt` rules.
    pub fn update(&self, id: &str, patch: NotePatch) -> Result<Option<Note>> {
        let history_limit = self.settings.version_history_length()?;

        let updated = self.store.transact(|state| {
            let note = state.notes.iter_mut().find(|n| n.id == id)?;
            let content_changed = note.apply(patch, history_limit);
            trace!(
                "Applied patch to note {} (content changed: {})",
                id,
                content_changed
            );
            Some(note.clone())
        })?;

        match &updated {
            Some(_) => debug!("Updated note {}", id),
            None => debug!("Ignoring update for unknown note {}", id),
        }
        Ok(updated)
    }

    /// Removes the note if present. Returns whether something was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .store
            .transact(|state| {
                let before = state.notes.len();
                state.notes.retain(|n| n.id != id);
                Some(state.notes.len() != before)
            })?
            .unwrap_or(false);

        if removed {
            info!("Deleted note {}", id);
        } else {
            debug!("Delete requested for unknown note {}", id);
        }
        Ok(removed)
    }

    /// Removes every note whose id is in `ids`, with a single write.
    pub fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let removed = self
            .store
            .transact(|state| {
                let before = state.notes.len();
                state.notes.retain(|n| !ids.contains(n.id.as_str()));
                Some(before - state.notes.len())
            })?
            .unwrap_or(0);

        info!("Deleted {} notes", removed);
        Ok(removed)
    }

    /// Case-insensitive substring search over title, body and tags.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Result<Vec<Note>> {
        let needle = query.to_lowercase();
        let matches = self.store.read(|state| {
            state
                .notes
                .iter()
                .filter(|note| note.matches(&needle))
                .cloned()
                .collect::<Vec<_>>()
        })?;

        debug!("Search '{}' matched {} notes", query, matches.len());
        Ok(matches)
    }

    /// Notes carrying `tag`, compared case-insensitively.
    pub fn notes_with_tag(&self, tag: &str) -> Result<Vec<Note>> {
        self.store.read(|state| {
            state
                .notes
                .iter()
                .filter(|note| note.has_tag(tag))
                .cloned()
                .collect()
        })
    }

    /// Recolors every note whose color is `old_color`, leaving `updatedAt`
    /// alone. Returns the changed notes.
    pub fn bulk_recolor(&self, old_color: &str, new_color: &str) -> Result<Vec<Note>> {
        let changed = self
            .store
            .transact(|state| {
                let changed = recolor_notes(&mut state.notes, old_color, new_color);
                (!changed.is_empty()).then_some(changed)
            })?
            .unwrap_or_default();

        info!(
            "Recolored {} notes from {} to {}",
            changed.len(),
            old_color,
            new_color
        );
        Ok(changed)
    }

    /// Serializes every note in the requested format.
    pub fn export_all(&self, format: ExportFormat) -> Result<String> {
        let notes = self.get_all()?;
        let output = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&notes)?,
            ExportFormat::Markdown => notes
                .iter()
                .map(Note::to_markdown)
                .collect::<Vec<_>>()
                .join("\n"),
        };

        info!("Exported {} notes as {}", notes.len(), format);
        Ok(output)
    }

    /// Appends the notes in `data` with fresh ids, fresh timestamps and the
    /// current default color. Either every note is imported or none is.
    /// Returns the notes as stored.
    pub fn import_all(&self, data: &str, format: ExportFormat) -> Result<Vec<Note>> {
        if format != ExportFormat::Json {
            warn!("Rejecting import in unsupported format {}", format);
            return Err(StickyError::UnsupportedFormat {
                operation: "import".to_string(),
                format: format.to_string(),
            });
        }

        let imported: Vec<ImportedNote> =
            serde_json::from_str(data).map_err(|e| StickyError::Validation {
                message: format!("Failed to import JSON notes: {}", e),
            })?;

        let color = self.settings.default_note_color()?;
        let notes: Vec<Note> = imported
            .into_iter()
            .map(|imported| Note::from_import(imported, &color))
            .collect();
        let stored = notes.clone();

        self.store.transact(move |state| {
            state.notes.extend(notes);
            Some(())
        })?;

        info!("Imported {} notes", stored.len());
        Ok(stored)
    }

    /// First note nobody has typed into yet, if any.
    pub fn find_empty_note(&self) -> Result<Option<Note>> {
        self.store
            .read(|state| state.notes.iter().find(|n| n.is_empty()).cloned())
    }

    pub fn pinned_notes(&self) -> Result<Vec<Note>> {
        self.store
            .read(|state| state.notes.iter().filter(|n| n.pinned).cloned().collect())
    }

    /// Most recently edited notes first.
    pub fn recent_notes(&self, limit: usize) -> Result<Vec<Note>> {
        let mut notes = self.get_all()?;
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes.truncate(limit);
        Ok(notes)
    }
}

/// Recolors notes whose color is `old_color` in place and returns copies of
/// the changed ones. `updatedAt` is left alone.
pub(crate) fn recolor_notes(notes: &mut [Note], old_color: &str, new_color: &str) -> Vec<Note> {
    notes
        .iter_mut()
        .filter(|note| note.color == old_color)
        .map(|note| {
            note.color = new_color.to_string();
            note.clone()
        })
        .collect()
}

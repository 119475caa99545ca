//! Core data structures for a single sticky note.
//!
//! This module contains the persisted `Note` record, its version snapshots and
//! the partial-update type windows send when they change a note.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{random_position, Settings};

/// Title given to notes created without one.
pub const DEFAULT_NOTE_TITLE: &str = "New Note";

/// Accent given to notes created without one.
pub const DEFAULT_ACCENT: &str = "#00E5FF";

/// Markup the editor produces for a note with nothing typed in it.
pub const EMPTY_BODY_MARKUP: [&str; 2] = ["<p></p>", "<p><br></p>"];

/// Last known bounds of a note window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotePosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Historical copy of a note's title/body, taken right before it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteVersion {
    pub at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Represents a single note in our system
///
/// Fields missing from a stored record take the same defaults as a freshly
/// created note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier for the note, never changes
    #[serde(default = "new_note_id")]
    pub id: String,
    /// Note title
    #[serde(default = "default_title")]
    pub title: String,
    /// Rich-text markup, opaque to the core
    #[serde(default)]
    pub body: String,
    /// Tags for organization
    #[serde(default)]
    pub tags: Vec<String>,
    /// Background color
    #[serde(default = "default_color")]
    pub color: String,
    /// Accent color
    #[serde(default = "default_accent")]
    pub accent: String,
    /// Always-on-top and hidden from the taskbar
    #[serde(default)]
    pub pinned: bool,
    /// Content interaction disabled; the window can still move and resize
    #[serde(default)]
    pub locked: bool,
    /// Last known window bounds
    #[serde(default = "random_position")]
    pub position: NotePosition,
    /// When the note was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last time the title or body changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Oldest first, capped by `versionHistoryLength`
    #[serde(default)]
    pub versions: Vec<NoteVersion>,
}

fn new_note_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_title() -> String {
    DEFAULT_NOTE_TITLE.to_string()
}

fn default_color() -> String {
    Settings::default().default_note_color
}

fn default_accent() -> String {
    DEFAULT_ACCENT.to_string()
}

/// Partial note as sent by windows for `note.create` and `note.update`.
///
/// Identity, timestamps and versions are owned by the store and are ignored
/// if a caller sends them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<NotePosition>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        NotePatch {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn body(body: impl Into<String>) -> Self {
        NotePatch {
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn pinned(pinned: bool) -> Self {
        NotePatch {
            pinned: Some(pinned),
            ..Default::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        NotePatch {
            locked: Some(locked),
            ..Default::default()
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        NotePatch {
            color: Some(color.into()),
            ..Default::default()
        }
    }

    /// True when applying this patch to `note` would change its title or body.
    pub fn changes_content_of(&self, note: &Note) -> bool {
        self.title.as_ref().is_some_and(|t| *t != note.title)
            || self.body.as_ref().is_some_and(|b| *b != note.body)
    }
}

/// A note as found in an import file. Only content and display fields are
/// taken over; identity, timestamps and color are always reassigned.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportedNote {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Vec<String>,
    pub accent: Option<String>,
    pub pinned: bool,
    pub locked: bool,
    pub position: Option<NotePosition>,
    pub versions: Vec<NoteVersion>,
}

impl Note {
    /// Creates a new note from a partial, filling every unset field with its
    /// default. `default_color` comes from the current settings.
    pub fn new(patch: NotePatch, default_color: &str) -> Self {
        let now = Utc::now();

        Note {
            id: new_note_id(),
            title: patch.title.unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string()),
            body: patch.body.unwrap_or_default(),
            tags: patch.tags.unwrap_or_default(),
            color: patch.color.unwrap_or_else(|| default_color.to_string()),
            accent: patch.accent.unwrap_or_else(|| DEFAULT_ACCENT.to_string()),
            pinned: patch.pinned.unwrap_or(false),
            locked: patch.locked.unwrap_or(false),
            position: patch.position.unwrap_or_else(random_position),
            created_at: now,
            updated_at: now,
            versions: Vec::new(),
        }
    }

    /// Builds a fresh note from an imported record.
    pub fn from_import(imported: ImportedNote, color: &str) -> Self {
        let now = Utc::now();

        Note {
            id: Uuid::new_v4().to_string(),
            title: imported
                .title
                .unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string()),
            body: imported.body.unwrap_or_default(),
            tags: imported.tags,
            color: color.to_string(),
            accent: imported
                .accent
                .unwrap_or_else(|| DEFAULT_ACCENT.to_string()),
            pinned: imported.pinned,
            locked: imported.locked,
            position: imported.position.unwrap_or_else(random_position),
            created_at: now,
            updated_at: now,
            versions: imported.versions,
        }
    }

    /// Merges `patch` into this note.
    ///
    /// A version snapshot of the current title/body is appended, and
    /// `updated_at` bumped, only when the title or body actually changes.
    /// History is trimmed to the newest `history_limit` entries.
    ///
    /// Returns whether the content changed.
    pub fn apply(&mut self, patch: NotePatch, history_limit: usize) -> bool {
        let content_changed = patch.changes_content_of(self);
        let now = Utc::now();

        if content_changed {
            self.versions.push(NoteVersion {
                at: now,
                title: self.title.clone(),
                body: self.body.clone(),
            });
        }
        if self.versions.len() > history_limit {
            let excess = self.versions.len() - history_limit;
            self.versions.drain(..excess);
        }

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(accent) = patch.accent {
            self.accent = accent;
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }

        if content_changed {
            self.updated_at = now;
        }
        content_changed
    }

    /// A note nobody has typed into yet: default/blank title and a blank or
    /// editor-empty body.
    pub fn is_empty(&self) -> bool {
        let title = self.title.trim();
        let body = self.body.trim();

        let blank_title = title.is_empty() || self.title == DEFAULT_NOTE_TITLE;
        let blank_body = body.is_empty() || EMPTY_BODY_MARKUP.contains(&self.body.as_str());
        blank_title && blank_body
    }

    /// Case-insensitive substring match on title, body or any tag.
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.body.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }

    /// Case-insensitive exact tag match.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }

    /// Markdown block used by the markdown export.
    pub fn to_markdown(&self) -> String {
        format!("# {}\n\n{}\n\n---\n", self.title, self.body)
    }
}

//! Process-wide application settings.
//!
//! Settings are loaded once at startup with every field defaulted, merged
//! shallowly on update and persisted together with the notes.
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::note_store::recolor_notes;
use crate::{Note, PersistentStore, Result};

/// OS-level shortcuts, active while the app runs in the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalShortcuts {
    pub new_note: String,
    pub show_hide: String,
    pub new_pinned_note: String,
}

impl Default for GlobalShortcuts {
    fn default() -> Self {
        Self {
            new_note: "CommandOrControl+Alt+N".to_string(),
            show_hide: "CommandOrControl+Alt+B".to_string(),
            new_pinned_note: "CommandOrControl+Shift+Alt+N".to_string(),
        }
    }
}

/// Shortcuts handled inside the app's own windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppShortcuts {
    pub new_note: String,
    pub new_pinned_note: String,
    pub toggle_dashboard: String,
    pub search: String,
    pub save: String,
}

impl Default for AppShortcuts {
    fn default() -> Self {
        Self {
            new_note: "Ctrl+N".to_string(),
            new_pinned_note: "Ctrl+Shift+N".to_string(),
            toggle_dashboard: "Ctrl+D".to_string(),
            search: "Ctrl+F".to_string(),
            save: "Ctrl+S".to_string(),
        }
    }
}

/// What the editor does with a checked-off list item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletedItemBehavior {
    #[default]
    Strike,
    Archive,
    Delete,
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: String,
    pub auto_save: bool,
    pub auto_save_interval: u32,
    /// Maximum number of version snapshots kept per note
    pub version_history_length: usize,
    pub global_shortcuts: GlobalShortcuts,
    pub completed_item_behavior: CompletedItemBehavior,
    pub auto_start: bool,
    /// Reopen pinned notes on startup
    pub restore_last_notes: bool,
    pub font_size: u32,
    pub font_family: String,
    pub auto_hide: bool,
    /// Color given to new and imported notes
    pub default_note_color: String,
    pub show_line_numbers: bool,
    pub word_wrap: bool,
    pub spell_check: bool,
    pub notifications: bool,
    pub sound_enabled: bool,
    pub auto_backup: bool,
    /// Minutes between automatic backups
    pub backup_interval: u32,
    pub max_backups: usize,
    /// Default focus session length in minutes
    pub focus_duration: u32,
    pub shortcuts: AppShortcuts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            auto_save: true,
            auto_save_interval: 5,
            version_history_length: 50,
            global_shortcuts: GlobalShortcuts::default(),
            completed_item_behavior: CompletedItemBehavior::Strike,
            auto_start: false,
            restore_last_notes: true,
            font_size: 14,
            font_family: "Inter".to_string(),
            auto_hide: false,
            default_note_color: "#111214".to_string(),
            show_line_numbers: false,
            word_wrap: true,
            spell_check: true,
            notifications: true,
            sound_enabled: false,
            auto_backup: true,
            backup_interval: 30,
            max_backups: 10,
            focus_duration: 25,
            shortcuts: AppShortcuts::default(),
        }
    }
}

/// Partial settings as sent by the settings window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_history_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_shortcuts: Option<GlobalShortcuts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_item_behavior: Option<CompletedItemBehavior>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_last_notes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_hide: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_note_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_line_numbers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_check: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_backup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_backups: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcuts: Option<AppShortcuts>,
}

macro_rules! merge_fields {
    ($patch:ident => $target:ident : $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}

impl SettingsPatch {
    /// Shallow merge: every present field replaces the current value, nested
    /// shortcut maps included.
    pub fn apply_to(self, settings: &mut Settings) {
        let patch = self;
        merge_fields!(patch => settings:
            theme,
            auto_save,
            auto_save_interval,
            version_history_length,
            global_shortcuts,
            completed_item_behavior,
            auto_start,
            restore_last_notes,
            font_size,
            font_family,
            auto_hide,
            default_note_color,
            show_line_numbers,
            word_wrap,
            spell_check,
            notifications,
            sound_enabled,
            auto_backup,
            backup_interval,
            max_backups,
            focus_duration,
            shortcuts,
        );
    }
}

/// Outcome of a settings update or reset.
#[derive(Debug, Clone, Default)]
pub struct SettingsChange {
    pub before: Settings,
    pub after: Settings,
    /// Notes moved from the old default color to the new one
    pub recolored: Vec<Note>,
}

impl SettingsChange {
    /// Whether any of the automatic backup options changed.
    pub fn backup_changed(&self) -> bool {
        self.before.auto_backup != self.after.auto_backup
            || self.before.backup_interval != self.after.backup_interval
            || self.before.max_backups != self.after.max_backups
    }
}

/// Owns reads and writes of the settings section of the store.
#[derive(Clone)]
pub struct SettingsManager {
    store: Arc<PersistentStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Current in-memory settings.
    pub fn get(&self) -> Result<Settings> {
        self.store.read(|state| state.settings.clone())
    }

    /// Merges `patch` over the current settings and persists the result.
    /// Values are stored as given.
    pub fn update(&self, patch: SettingsPatch) -> Result<SettingsChange> {
        debug!("Updating settings: {:?}", patch);
        let change = self.transact(|settings| patch.apply_to(settings))?;
        info!("Settings updated");
        Ok(change)
    }

    /// Restores every option to its default.
    pub fn reset(&self) -> Result<SettingsChange> {
        info!("Resetting settings to defaults");
        self.transact(|settings| *settings = Settings::default())
    }

    /// Changes the settings and, when `defaultNoteColor` moves, recolors the
    /// notes still carrying the old default. Both are written in one save, so
    /// a failed write leaves settings and notes as they were.
    fn transact(&self, f: impl FnOnce(&mut Settings)) -> Result<SettingsChange> {
        self.store
            .transact(|state| {
                let before = state.settings.clone();
                f(&mut state.settings);

                let recolored = if before.default_note_color != state.settings.default_note_color {
                    recolor_notes(
                        &mut state.notes,
                        &before.default_note_color,
                        &state.settings.default_note_color,
                    )
                } else {
                    Vec::new()
                };

                Some(SettingsChange {
                    before,
                    after: state.settings.clone(),
                    recolored,
                })
            })
            .map(Option::unwrap_or_default)
    }

    pub fn default_note_color(&self) -> Result<String> {
        self.store
            .read(|state| state.settings.default_note_color.clone())
    }

    pub fn version_history_length(&self) -> Result<usize> {
        self.store
            .read(|state| state.settings.version_history_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_is_fully_defaulted() {
        let settings: Settings =
            serde_json::from_str(r#"{"theme":"light","fontSize":18}"#).unwrap();
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.font_size, 18);
        assert_eq!(settings.version_history_length, 50);
        assert_eq!(settings.default_note_color, "#111214");
        assert_eq!(settings.shortcuts, AppShortcuts::default());
    }

    #[test]
    fn nested_maps_are_replaced_not_merged() {
        let mut settings = Settings::default();
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"shortcuts":{"search":"Ctrl+K"}}"#).unwrap();
        patch.apply_to(&mut settings);

        assert_eq!(settings.shortcuts.search, "Ctrl+K");
        // keys absent from the supplied map fall back to defaults, not to the old map
        let mut custom = Settings::default();
        custom.shortcuts.save = "Ctrl+Alt+S".into();
        SettingsPatch {
            shortcuts: Some(settings.shortcuts.clone()),
            ..Default::default()
        }
        .apply_to(&mut custom);
        assert_eq!(custom.shortcuts.save, "Ctrl+S");
    }

    #[test]
    fn default_color_change_recolors_in_the_same_write() {
        let store = Arc::new(PersistentStore::in_memory());
        store
            .transact(|state| {
                state.notes.push(Note::new(Default::default(), "#111214"));
                state.notes.push(Note::new(Default::default(), "#ff0000"));
                Some(())
            })
            .unwrap();
        let manager = SettingsManager::new(Arc::clone(&store));

        let change = manager
            .update(SettingsPatch {
                default_note_color: Some("#222222".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(change.before.default_note_color, "#111214");
        assert_eq!(change.recolored.len(), 1);
        assert_eq!(change.recolored[0].color, "#222222");
        assert!(!change.backup_changed());

        let change = manager.reset().unwrap();
        assert_eq!(change.recolored.len(), 1);
        let colors = store
            .read(|state| state.notes.iter().map(|n| n.color.clone()).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(colors, vec!["#111214", "#ff0000"]);
    }

    #[test]
    fn absent_fields_are_untouched() {
        let mut settings = Settings::default();
        settings.font_family = "Mono".into();
        SettingsPatch {
            font_size: Some(0),
            ..Default::default()
        }
        .apply_to(&mut settings);

        assert_eq!(settings.font_size, 0);
        assert_eq!(settings.font_family, "Mono");
    }
}

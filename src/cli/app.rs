//! CLI module for the stickynotes application
//!
//! Every subcommand is turned into dispatcher requests sent as an external
//! (non-window) sender, exactly like the tray or a global hotkey would.
use std::path::PathBuf;

use log::{debug, info};

use crate::{
    parse_tags, Client, Commands, ExportFormat, ExportOutput, ImportSource, Note, NotePatch,
    Request, Response, Result, Settings, SettingsPatch, StickyError,
};

/// CLI Application handler - turns CLI commands into dispatcher requests
pub struct App {
    /// External client of the running dispatcher
    client: Client,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    pub fn new(client: Client, verbose: bool) -> Self {
        Self { client, verbose }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run => self.run_headless().await?,

            Commands::List { tag, json } => {
                let request = match tag {
                    Some(tag) => Request::NoteWithTag { tag },
                    None => Request::NoteGetAll,
                };
                let notes = self.notes(request).await?;
                self.display_notes(&notes, json)?;
            }

            Commands::Search { query, json } => {
                let notes = self.notes(Request::NoteSearch { query: query.clone() }).await?;
                if notes.is_empty() && !json {
                    println!("No notes found matching query: \"{}\"", query);
                } else {
                    self.display_notes(&notes, json)?;
                }
            }

            Commands::New {
                title,
                body,
                tags,
                pinned,
            } => self.create_note(title, body, tags, pinned).await?,

            Commands::Delete { id } => self.handle_delete(id).await?,

            Commands::Export { format, output } => self.handle_export(format, output).await?,

            Commands::Import { source, format } => {
                let response = self
                    .client
                    .request(Request::ImportNotes {
                        source: ImportSource::File(source.clone()),
                        format,
                    })
                    .await?;
                if let Response::Count(count) = response {
                    println!("Imported {} notes from {}", count, source.display());
                }
            }

            Commands::Settings { set, reset } => self.handle_settings(set, reset).await?,

            Commands::Backup => {
                if let Response::Backup(path) = self.client.request(Request::BackupNow).await? {
                    println!("Backup created at {}", path.display());
                }
            }
        }

        Ok(())
    }

    /// Starts the core, waits for Ctrl-C, then shuts everything down.
    async fn run_headless(&self) -> Result<()> {
        self.client.request(Request::AppStart).await?;
        println!("StickyNotes is running. Press Ctrl-C to quit.");

        tokio::signal::ctrl_c().await?;
        info!("Ctrl-C received");

        self.client.request(Request::AppQuit).await?;
        Ok(())
    }

    async fn notes(&self, request: Request) -> Result<Vec<Note>> {
        let response = self.client.request(request).await?;
        response.into_notes().ok_or_else(|| StickyError::ApplicationError {
            message: "Unexpected response to a note query".to_string(),
        })
    }

    async fn create_note(
        &self,
        title: Option<String>,
        body: Option<String>,
        tags: Option<String>,
        pinned: bool,
    ) -> Result<()> {
        if title.is_none() && body.is_none() && tags.is_none() {
            let window = self
                .client
                .request(Request::WindowNewNote { pinned })
                .await?
                .window();
            if let Some(window) = window {
                println!("Note opened in window {}", window);
            }
            return Ok(());
        }

        let parsed_tags = parse_tags(tags);
        let patch = NotePatch {
            title,
            body,
            tags: (!parsed_tags.is_empty()).then_some(parsed_tags),
            pinned: Some(pinned),
            ..Default::default()
        };

        let response = self.client.request(Request::NoteCreate(patch)).await?;
        if let Some(note) = response.into_note() {
            println!("Note created with ID: {}", note.id);
        }
        Ok(())
    }

    async fn handle_delete(&self, id: String) -> Result<()> {
        let note = self
            .client
            .request(Request::NoteGet { id: id.clone() })
            .await?
            .into_note();

        let Some(note) = note else {
            println!("No note with ID {}", id);
            return Ok(());
        };

        self.client.request(Request::NoteDelete { id }).await?;
        println!(
            "Note '{}' ({}) has been permanently deleted.",
            note.title, note.id
        );
        Ok(())
    }

    async fn handle_export(&self, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
        let response = self
            .client
            .request(Request::ExportNotes {
                format,
                path: output,
            })
            .await?;

        match response {
            Response::Export(ExportOutput::Data(data)) => println!("{}", data),
            Response::Export(ExportOutput::Written(path)) => {
                println!("Exported notes to {}", path.display())
            }
            other => debug!("Unexpected export response: {:?}", other),
        }
        Ok(())
    }

    async fn handle_settings(&self, set: Option<String>, reset: bool) -> Result<()> {
        let request = match (set, reset) {
            (_, true) => Request::SettingsReset,
            (Some(assignment), false) => Request::SettingsUpdate(parse_assignment(&assignment)?),
            (None, false) => Request::SettingsGet,
        };

        let response = self.client.request(request).await?;
        if let Some(settings) = response.into_settings() {
            self.display_settings(&settings)?;
        }
        Ok(())
    }

    fn display_settings(&self, settings: &Settings) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(settings)?);
        Ok(())
    }

    /// Display notes as JSON or as a short text listing
    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes found.");
            return Ok(());
        }

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(50));
            }

            let updated_at = note.updated_at.format("%Y-%m-%d %H:%M");
            println!("ID: {} | Updated: {}", note.id, updated_at);

            let mut flags = Vec::new();
            if note.pinned {
                flags.push("pinned");
            }
            if note.locked {
                flags.push("locked");
            }
            if flags.is_empty() {
                println!("Title: {}", note.title);
            } else {
                println!("Title: {} [{}]", note.title, flags.join(", "));
            }

            if !note.tags.is_empty() {
                let tags = note
                    .tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Tags: {}", tags);
            }

            let preview = content_preview(&note.body, if self.verbose { 400 } else { 100 });
            if !preview.is_empty() {
                println!("\n{}", preview);
            }
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }
}

/// Parses `key=value` into a settings patch. The value is read as JSON when
/// possible (`16`, `true`, `{...}`), otherwise taken as a string.
fn parse_assignment(assignment: &str) -> Result<SettingsPatch> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| StickyError::ConfigError {
            message: format!("Expected key=value, got '{}'", assignment),
        })?;

    let key = key.trim();
    let value = value.trim();
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut object = serde_json::Map::new();
    object.insert(key.to_string(), value);
    let patch: SettingsPatch =
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            StickyError::ConfigError {
                message: format!("Invalid value for {}: {}", key, e),
            }
        })?;

    if patch == SettingsPatch::default() {
        return Err(StickyError::ConfigError {
            message: format!("Unknown setting: {}", key),
        });
    }
    Ok(patch)
}

/// First line of text in `body` with markup stripped, cut to `max_len` chars.
fn content_preview(body: &str, max_len: usize) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let line = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if line.chars().count() <= max_len {
        line
    } else {
        format!("{}...", line.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{spawn_dispatcher, Config, HeadlessBackend, PersistentStore};

    fn new_command(title: Option<&str>) -> Commands {
        Commands::New {
            title: title.map(str::to_string),
            body: None,
            tags: None,
            pinned: false,
        }
    }

    #[tokio::test]
    async fn new_without_content_reuses_the_empty_note() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) = spawn_dispatcher(
            Config::with_data_dir(dir.path()),
            Arc::new(PersistentStore::in_memory()),
            Arc::new(HeadlessBackend),
        );
        let app = App::new(handle.external(), false);

        for _ in 0..3 {
            app.run(new_command(None)).await.unwrap();
        }
        let notes = app.notes(Request::NoteGetAll).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_empty());

        app.run(new_command(Some("Groceries"))).await.unwrap();
        assert_eq!(app.notes(Request::NoteGetAll).await.unwrap().len(), 2);

        drop(app);
        drop(handle);
        task.await.unwrap();
    }

    #[test]
    fn assignment_parses_typed_values() {
        let patch = parse_assignment("fontSize=16").unwrap();
        assert_eq!(patch.font_size, Some(16));

        let patch = parse_assignment("theme=light").unwrap();
        assert_eq!(patch.theme.as_deref(), Some("light"));

        let patch = parse_assignment("autoBackup=false").unwrap();
        assert_eq!(patch.auto_backup, Some(false));
    }

    #[test]
    fn assignment_rejects_unknown_and_malformed() {
        assert!(matches!(
            parse_assignment("noSuchThing=1"),
            Err(StickyError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_assignment("fontSize"),
            Err(StickyError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_assignment("fontSize=big"),
            Err(StickyError::ConfigError { .. })
        ));
    }

    #[test]
    fn preview_strips_markup() {
        assert_eq!(
            content_preview("<p>Buy <b>milk</b></p><p>and eggs</p>", 100),
            "Buy milk and eggs"
        );
        assert_eq!(content_preview("<p>abcdef</p>", 3), "abc...");
        assert_eq!(content_preview("<p><br></p>", 10), "");
    }
}

//! Shared types for the sticky notes core.
//!
//! This module contains the small value types used across components and the
//! CLI subcommands.
use std::{fmt, path::PathBuf, str::FromStr};

use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::StickyError;

/// A specialized Result type for sticky notes operations.
pub type Result<T> = std::result::Result<T, StickyError>;

/// Serialization formats for export/import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StickyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(StickyError::UnsupportedFormat {
                operation: "export".to_string(),
                format: other.to_string(),
            }),
        }
    }
}

/// Result of `export.notes`: the serialized notes, or the file they went to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportOutput {
    Data(String),
    Written(PathBuf),
}

/// Where `import.notes` reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportSource {
    Data(String),
    File(PathBuf),
}

/// Available subcommands for the stickynotes binary
#[derive(Subcommand)]
pub enum Commands {
    /// Start the core headlessly and keep it running until Ctrl-C
    Run,

    /// List notes, optionally filtered by tag
    List {
        /// Only notes carrying this tag
        #[clap(short, long)]
        tag: Option<String>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search notes by title, body or tag
    Search {
        /// Search query text
        query: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Create a note (reuses an existing empty note when no content is given)
    New {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// Body of the note
        #[clap(short, long)]
        body: Option<String>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short, long)]
        tags: Option<String>,

        /// Pin the note
        #[clap(short, long)]
        pinned: bool,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,
    },

    /// Export all notes
    Export {
        /// Format to export to
        #[clap(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Import notes from a file
    Import {
        /// Path to the file to import
        source: PathBuf,

        /// Format of the import source
        #[clap(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },

    /// Show or change settings
    Settings {
        /// Update a setting, e.g. `fontSize=16`
        #[clap(short, long)]
        set: Option<String>,

        /// Reset settings to defaults
        #[clap(short, long)]
        reset: bool,
    },

    /// Create a backup of the store now
    Backup,
}

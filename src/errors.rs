//! Error types for the sticky notes core.
//!
//! This module defines the single error enum shared by the note store, the
//! settings manager, the window registry and the command dispatcher.

use std::{io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for the sticky notes core.
#[derive(Error, Debug)]
pub enum StickyError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A payload handed to the core could not be understood (e.g. an import
    /// that is not a JSON array of notes). Nothing was written.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Export/import format that is not implemented for the operation.
    #[error("Unsupported {operation} format: {format}")]
    UnsupportedFormat { operation: String, format: String },

    /// The persistent store could not be written. The in-memory snapshot is
    /// still the last one that reached disk.
    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    /// No live window is registered under this id.
    #[error("Window not found: {id}")]
    WindowNotFound { id: u32 },

    /// A note-only window operation was issued against another role.
    #[error("Window {id} does not show a note")]
    NotANoteWindow { id: u32 },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// The dispatcher loop is gone; no request can be served.
    #[error("Dispatcher is not running")]
    DispatcherClosed,

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl StickyError {
    /// Stable machine-readable name of the error kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            StickyError::Io(_) => "io",
            StickyError::Serialization(_) => "serialization",
            StickyError::Validation { .. } => "validation",
            StickyError::UnsupportedFormat { .. } => "unsupportedFormat",
            StickyError::StorageFailure { .. } => "storageFailure",
            StickyError::WindowNotFound { .. } => "windowNotFound",
            StickyError::NotANoteWindow { .. } => "notANoteWindow",
            StickyError::ConfigError { .. } => "config",
            StickyError::DirectoryError { .. } => "directory",
            StickyError::LockAcquisitionFailed { .. } => "lock",
            StickyError::DispatcherClosed => "dispatcherClosed",
            StickyError::ApplicationError { .. } => "application",
        }
    }
}

/// Serializable form of a rejected request, as handed back to a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&StickyError> for ErrorPayload {
    fn from(err: &StickyError) -> Self {
        ErrorPayload {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

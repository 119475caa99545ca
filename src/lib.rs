//! Sticky notes application core
//!
//! This library keeps notes and settings on disk and coordinates every window
//! of a sticky notes app (dashboard, settings, one window per note, focus
//! widget) through a single command dispatcher.

mod backup_scheduler;
mod cli;
mod config;
mod dispatcher;
mod errors;
mod focus;
mod helper;
mod note;
mod note_store;
mod registry;
mod settings;
mod storage;
mod types;
mod window;

// Re-export key components
pub use backup_scheduler::*;
pub use cli::*;
pub use config::*;
pub use dispatcher::*;
pub use errors::*;
pub use focus::*;
pub use helper::*;
pub use note::*;
pub use note_store::*;
pub use registry::*;
pub use settings::*;
pub use storage::*;
pub use types::*;
pub use window::*;

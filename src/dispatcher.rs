//! Command Dispatcher: the only way into the core.
//!
//! One tokio task owns every component and handles messages strictly in
//! arrival order, so a compound operation (read, version, merge, persist,
//! broadcast) always runs to completion before the next one starts. Senders
//! hold a cheap [`DispatcherHandle`] and either await a reply
//! ([`DispatcherHandle::request`]) or fire and forget
//! ([`DispatcherHandle::emit`]).
use std::{fmt, fs, path::PathBuf, sync::Arc};

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    BackupScheduler, Config, ErrorPayload, ExportFormat, ExportOutput, FocusMode, FocusSession,
    FocusSessionManager, FocusStatus, FocusTick, ImportSource, Note, NotePatch, NoteStore,
    PersistentStore, Result, Settings, SettingsChange, SettingsManager, SettingsPatch, StickyError,
    TickOutcome, TimerState, WindowBackend, WindowEvent, WindowId, WindowRegistry, WindowRole,
};

const DISPATCH_QUEUE: usize = 64;

/// Which window a window command is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowTarget {
    /// The window that sent the command
    Current,
    Id(WindowId),
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Window(WindowId),
    /// Tray, global hotkeys, the CLI
    External,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Window(id) => write!(f, "window {}", id),
            Origin::External => write!(f, "external"),
        }
    }
}

/// Every command a window (or the tray, or the CLI) can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args")]
pub enum Request {
    #[serde(rename = "note.create")]
    NoteCreate(NotePatch),
    #[serde(rename = "note.update")]
    NoteUpdate { id: String, patch: NotePatch },
    #[serde(rename = "note.delete")]
    NoteDelete { id: String },
    #[serde(rename = "note.deleteMany")]
    NoteDeleteMany { ids: Vec<String> },
    #[serde(rename = "note.get")]
    NoteGet { id: String },
    #[serde(rename = "note.getAll")]
    NoteGetAll,
    #[serde(rename = "note.search")]
    NoteSearch { query: String },
    #[serde(rename = "note.withTag")]
    NoteWithTag { tag: String },
    #[serde(rename = "note.bulkRecolor", rename_all = "camelCase")]
    NoteBulkRecolor { old_color: String, new_color: String },
    #[serde(rename = "note.recent")]
    NoteRecent { limit: usize },

    /// Opens the window of an existing note, or runs the new-note policy
    /// when no id is given.
    #[serde(rename = "window.createOrFocusNote", rename_all = "camelCase")]
    WindowCreateOrFocusNote {
        #[serde(default)]
        note_id: Option<String>,
    },
    /// New-note policy with an explicit pin state (hotkeys, tray).
    #[serde(rename = "window.newNote")]
    WindowNewNote {
        #[serde(default)]
        pinned: bool,
    },
    #[serde(rename = "window.close")]
    WindowClose { target: WindowTarget },
    #[serde(rename = "window.togglePin")]
    WindowTogglePin { target: WindowTarget },
    #[serde(rename = "window.togglePinCurrent")]
    WindowTogglePinCurrent,
    #[serde(rename = "window.toggleLock")]
    WindowToggleLock { target: WindowTarget },
    #[serde(rename = "window.toggleLockCurrent")]
    WindowToggleLockCurrent,
    #[serde(rename = "window.openSettings")]
    WindowOpenSettings,
    #[serde(rename = "window.showDashboard")]
    WindowShowDashboard,
    #[serde(rename = "window.hideDashboard")]
    WindowHideDashboard,
    #[serde(rename = "window.toggleDashboard")]
    WindowToggleDashboard,
    #[serde(rename = "window.toggleAllNotes")]
    WindowToggleAllNotes,
    #[serde(rename = "window.currentId")]
    WindowCurrentId,

    #[serde(rename = "settings.get")]
    SettingsGet,
    #[serde(rename = "settings.update")]
    SettingsUpdate(SettingsPatch),
    #[serde(rename = "settings.reset")]
    SettingsReset,

    /// Serializes all notes; with a `path` the result is written there.
    #[serde(rename = "export.notes")]
    ExportNotes {
        format: ExportFormat,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    #[serde(rename = "import.notes")]
    ImportNotes {
        source: ImportSource,
        format: ExportFormat,
    },

    /// `duration` in minutes, `focusDuration` from settings when absent.
    #[serde(rename = "focus.start")]
    FocusStart {
        #[serde(default)]
        duration: Option<u32>,
        #[serde(default)]
        mode: Option<FocusMode>,
    },
    #[serde(rename = "focus.pause")]
    FocusPause,
    #[serde(rename = "focus.resume")]
    FocusResume,
    #[serde(rename = "focus.stop")]
    FocusStop,
    #[serde(rename = "focus.getState")]
    FocusGetState,

    #[serde(rename = "backup.now")]
    BackupNow,
    /// Opens the dashboard, restores pinned notes and starts backups.
    #[serde(rename = "app.start")]
    AppStart,
    #[serde(rename = "app.quit")]
    AppQuit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Response {
    Unit,
    Note(Note),
    MaybeNote(Option<Note>),
    Notes(Vec<Note>),
    Window(WindowId),
    MaybeWindow(Option<WindowId>),
    Settings(Settings),
    Export(ExportOutput),
    Count(usize),
    Focus(FocusSession),
    Backup(PathBuf),
}

/// Answer to a request in the form windows receive it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    Ok(Response),
    Error(ErrorPayload),
}

impl From<Result<Response>> for Reply {
    fn from(result: Result<Response>) -> Self {
        match result {
            Ok(response) => Reply::Ok(response),
            Err(e) => Reply::Error(ErrorPayload::from(&e)),
        }
    }
}

impl Response {
    pub fn into_note(self) -> Option<Note> {
        match self {
            Response::Note(note) => Some(note),
            Response::MaybeNote(note) => note,
            _ => None,
        }
    }

    pub fn into_notes(self) -> Option<Vec<Note>> {
        match self {
            Response::Notes(notes) => Some(notes),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<WindowId> {
        match self {
            Response::Window(id) => Some(*id),
            Response::MaybeWindow(id) => *id,
            _ => None,
        }
    }

    pub fn into_settings(self) -> Option<Settings> {
        match self {
            Response::Settings(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn into_focus(self) -> Option<FocusSession> {
        match self {
            Response::Focus(session) => Some(session),
            _ => None,
        }
    }
}

struct Message {
    origin: Origin,
    request: Request,
    reply: Option<oneshot::Sender<Result<Response>>>,
}

/// Everything the dispatcher task owns.
struct Core {
    config: Config,
    notes: NoteStore,
    settings: SettingsManager,
    windows: WindowRegistry,
    focus: FocusSessionManager,
    backups: BackupScheduler,
    started: bool,
    shut_down: bool,
}

impl Core {
    async fn handle(&mut self, origin: Origin, request: Request) -> Result<Response> {
        match request {
            Request::NoteCreate(patch) => {
                let note = self.notes.create(patch)?;
                self.windows.broadcast(WindowEvent::NoteUpdated(note.clone()));
                Ok(Response::Note(note))
            }
            Request::NoteUpdate { id, patch } => self.update_note(&id, patch),
            Request::NoteDelete { id } => {
                if self.notes.delete(&id)? {
                    self.forget_note(&id);
                }
                Ok(Response::Unit)
            }
            Request::NoteDeleteMany { ids } => {
                let mut existing = Vec::with_capacity(ids.len());
                for id in ids {
                    if self.notes.get(&id)?.is_some() {
                        existing.push(id);
                    }
                }

                let removed = self.notes.delete_many(&existing)?;
                for id in &existing {
                    self.forget_note(id);
                }
                Ok(Response::Count(removed))
            }
            Request::NoteGet { id } => Ok(Response::MaybeNote(self.notes.get(&id)?)),
            Request::NoteGetAll => Ok(Response::Notes(self.notes.get_all()?)),
            Request::NoteSearch { query } => Ok(Response::Notes(self.notes.search(&query)?)),
            Request::NoteWithTag { tag } => Ok(Response::Notes(self.notes.notes_with_tag(&tag)?)),
            Request::NoteBulkRecolor {
                old_color,
                new_color,
            } => {
                let changed = self.notes.bulk_recolor(&old_color, &new_color)?;
                self.broadcast_notes(&changed);
                Ok(Response::Notes(changed))
            }
            Request::NoteRecent { limit } => Ok(Response::Notes(self.notes.recent_notes(limit)?)),

            Request::WindowCreateOrFocusNote { note_id } => {
                let window = match note_id {
                    Some(id) => {
                        let note = self.notes.get(&id)?;
                        if note.is_none() {
                            debug!("Opening window for unknown note {}", id);
                        }
                        self.windows.open_or_focus(WindowRole::Note(id), note.as_ref())
                    }
                    None => self.new_note(None)?,
                };
                Ok(Response::Window(window))
            }
            Request::WindowNewNote { pinned } => Ok(Response::Window(self.new_note(Some(pinned))?)),
            Request::WindowClose { target } => {
                let id = self.resolve_target(origin, target)?;
                self.windows.close_window(id);
                Ok(Response::Unit)
            }
            Request::WindowTogglePin { target } => {
                let id = self.resolve_target(origin, target)?;
                self.toggle_pin(id)?;
                Ok(Response::Unit)
            }
            Request::WindowTogglePinCurrent => {
                let id = self.resolve_target(origin, WindowTarget::Current)?;
                self.toggle_pin(id)?;
                Ok(Response::Unit)
            }
            Request::WindowToggleLock { target } => {
                let id = self.resolve_target(origin, target)?;
                self.toggle_lock(id)?;
                Ok(Response::Unit)
            }
            Request::WindowToggleLockCurrent => {
                let id = self.resolve_target(origin, WindowTarget::Current)?;
                self.toggle_lock(id)?;
                Ok(Response::Unit)
            }
            Request::WindowOpenSettings => Ok(Response::Window(
                self.windows.open_or_focus(WindowRole::Settings, None),
            )),
            Request::WindowShowDashboard => Ok(Response::Window(self.windows.show_dashboard())),
            Request::WindowHideDashboard => {
                self.windows.hide_dashboard();
                Ok(Response::Unit)
            }
            Request::WindowToggleDashboard => {
                self.windows.toggle_dashboard();
                Ok(Response::Unit)
            }
            Request::WindowToggleAllNotes => {
                self.windows.toggle_all_notes();
                Ok(Response::Unit)
            }
            Request::WindowCurrentId => {
                let current = match origin {
                    Origin::Window(id) => self.windows.resolve_sender_role(id).map(|_| id),
                    Origin::External => None,
                };
                Ok(Response::MaybeWindow(current))
            }

            Request::SettingsGet => Ok(Response::Settings(self.settings.get()?)),
            Request::SettingsUpdate(patch) => {
                let change = self.settings.update(patch)?;
                Ok(Response::Settings(self.settings_changed(change).await))
            }
            Request::SettingsReset => {
                let change = self.settings.reset()?;
                Ok(Response::Settings(self.settings_changed(change).await))
            }

            Request::ExportNotes { format, path } => {
                let data = self.notes.export_all(format)?;
                match path {
                    Some(path) => {
                        fs::write(&path, data)?;
                        info!("Exported notes to {}", path.display());
                        Ok(Response::Export(ExportOutput::Written(path)))
                    }
                    None => Ok(Response::Export(ExportOutput::Data(data))),
                }
            }
            Request::ImportNotes { source, format } => {
                let data = match source {
                    ImportSource::Data(data) => data,
                    ImportSource::File(path) => {
                        debug!("Reading import file {}", path.display());
                        fs::read_to_string(&path)?
                    }
                };
                let imported = self.notes.import_all(&data, format)?;
                self.broadcast_notes(&imported);
                Ok(Response::Count(imported.len()))
            }

            Request::FocusStart { duration, mode } => {
                let duration = match duration {
                    Some(minutes) => minutes,
                    None => self.settings.get()?.focus_duration,
                };
                let mode = mode.unwrap_or(self.focus.session().mode);
                if self.focus.start(duration, mode) {
                    self.windows.open_or_focus(WindowRole::FocusWidget, None);
                    self.broadcast_focus();
                }
                Ok(Response::Focus(self.focus.session().clone()))
            }
            Request::FocusPause => {
                if self.focus.pause() {
                    self.broadcast_focus();
                }
                Ok(Response::Focus(self.focus.session().clone()))
            }
            Request::FocusResume => {
                if self.focus.resume() {
                    self.broadcast_focus();
                }
                Ok(Response::Focus(self.focus.session().clone()))
            }
            Request::FocusStop => {
                if self.focus.stop() {
                    self.broadcast_focus();
                    self.windows.close(&WindowRole::FocusWidget);
                }
                Ok(Response::Focus(self.focus.session().clone()))
            }
            Request::FocusGetState => Ok(Response::Focus(self.focus.session().clone())),

            Request::BackupNow => Ok(Response::Backup(self.backups.create_backup_now().await?)),
            Request::AppStart => {
                self.startup().await?;
                Ok(Response::Unit)
            }
            Request::AppQuit => {
                self.shutdown().await;
                Ok(Response::Unit)
            }
        }
    }

    fn update_note(&mut self, id: &str, patch: NotePatch) -> Result<Response> {
        let pinned = patch.pinned;
        let locked = patch.locked;

        let Some(note) = self.notes.update(id, patch)? else {
            return Ok(Response::MaybeNote(None));
        };

        if let Some(window) = self.windows.window_for(&WindowRole::Note(note.id.clone())) {
            if let Some(pinned) = pinned {
                self.windows.set_pinned_chrome(window, pinned);
            }
            if let Some(locked) = locked {
                self.windows.set_locked_chrome(window, locked);
            }
        }

        self.windows.broadcast(WindowEvent::NoteUpdated(note.clone()));
        if let Some(locked) = locked {
            self.windows.broadcast(WindowEvent::LockStateChanged {
                note_id: note.id.clone(),
                locked,
            });
        }
        Ok(Response::MaybeNote(Some(note)))
    }

    /// Reuses the first empty note if there is one, otherwise creates a note.
    /// `pinned` is applied to a reused note only when its window is not
    /// already open.
    fn new_note(&mut self, pinned: Option<bool>) -> Result<WindowId> {
        if let Some(empty) = self.notes.find_empty_note()? {
            let role = WindowRole::Note(empty.id.clone());
            if self.windows.is_open(&role) {
                debug!("Empty note {} already open, focusing it", empty.id);
                return Ok(self.windows.open_or_focus(role, None));
            }

            let note = match pinned {
                Some(pinned) if pinned != empty.pinned => {
                    match self.notes.update(&empty.id, NotePatch::pinned(pinned))? {
                        Some(note) => {
                            self.windows.broadcast(WindowEvent::NoteUpdated(note.clone()));
                            note
                        }
                        None => empty,
                    }
                }
                _ => empty,
            };

            debug!("Reusing empty note {}", note.id);
            return Ok(self.windows.open_or_focus(role, Some(&note)));
        }

        let note = self.notes.create(NotePatch::pinned(pinned.unwrap_or(false)))?;
        self.windows.broadcast(WindowEvent::NoteUpdated(note.clone()));
        Ok(self
            .windows
            .open_or_focus(WindowRole::Note(note.id.clone()), Some(&note)))
    }

    fn resolve_target(&self, origin: Origin, target: WindowTarget) -> Result<WindowId> {
        let id = match (target, origin) {
            (WindowTarget::Id(id), _) | (WindowTarget::Current, Origin::Window(id)) => id,
            (WindowTarget::Current, Origin::External) => {
                return Err(StickyError::ApplicationError {
                    message: "An external sender has no current window".to_string(),
                })
            }
        };

        match self.windows.resolve_sender_role(id) {
            Some(_) => Ok(id),
            None => Err(StickyError::WindowNotFound { id: id.0 }),
        }
    }

    /// Flips the note's `pinned` first, then the window chrome, so a failed
    /// write changes neither.
    fn toggle_pin(&mut self, window: WindowId) -> Result<()> {
        let note = match self.windows.note_id_for(window) {
            Some(note_id) => self.notes.get(&note_id)?,
            None => None,
        };

        let Some(note) = note else {
            let pinned = self
                .windows
                .snapshot(window)
                .is_some_and(|w| !w.chrome.always_on_top);
            self.windows.set_pinned_chrome(window, pinned);
            return Ok(());
        };

        let pinned = !note.pinned;
        let updated = self.notes.update(&note.id, NotePatch::pinned(pinned))?;
        self.windows.set_pinned_chrome(window, pinned);
        if let Some(updated) = updated {
            self.windows.broadcast(WindowEvent::NoteUpdated(updated));
        }

        info!("Window {} pinned: {}", window, pinned);
        Ok(())
    }

    fn toggle_lock(&mut self, window: WindowId) -> Result<()> {
        let note_id = self
            .windows
            .note_id_for(window)
            .ok_or(StickyError::NotANoteWindow { id: window.0 })?;

        let Some(note) = self.notes.get(&note_id)? else {
            let locked = self
                .windows
                .snapshot(window)
                .is_some_and(|w| !w.chrome.ignore_mouse_events);
            self.windows.set_locked_chrome(window, locked);
            return Ok(());
        };

        let locked = !note.locked;
        let updated = self.notes.update(&note.id, NotePatch::locked(locked))?;
        self.windows.set_locked_chrome(window, locked);
        if let Some(updated) = updated {
            self.windows.broadcast(WindowEvent::NoteUpdated(updated));
        }
        self.windows
            .broadcast(WindowEvent::LockStateChanged { note_id, locked });

        info!("Window {} locked: {}", window, locked);
        Ok(())
    }

    fn forget_note(&mut self, id: &str) {
        self.windows.close(&WindowRole::Note(id.to_string()));
        self.windows
            .broadcast(WindowEvent::NoteDeleted { id: id.to_string() });
    }

    fn broadcast_notes(&mut self, notes: &[Note]) {
        for note in notes {
            self.windows.broadcast(WindowEvent::NoteUpdated(note.clone()));
        }
    }

    async fn settings_changed(&mut self, change: SettingsChange) -> Settings {
        self.broadcast_notes(&change.recolored);

        if self.started && change.backup_changed() {
            if let Err(e) = self.backups.reconfigure(&change.after).await {
                error!("Failed to reconfigure backups: {}", e);
            }
        }

        self.windows
            .broadcast(WindowEvent::SettingsUpdated(change.after.clone()));
        change.after
    }

    fn broadcast_focus(&mut self) {
        let session = self.focus.session();
        let event = WindowEvent::FocusTick {
            remaining: session.remaining,
            state: session.state,
        };
        self.windows.broadcast(event);
    }

    fn on_focus_tick(&mut self, tick: FocusTick) {
        match self.focus.on_tick(tick) {
            Some(TickOutcome::Ticked { remaining }) => {
                self.windows.broadcast(WindowEvent::FocusTick {
                    remaining,
                    state: TimerState::Running,
                });
            }
            Some(TickOutcome::Completed) => {
                self.windows.broadcast(WindowEvent::FocusTick {
                    remaining: 0,
                    state: TimerState::Running,
                });
                self.broadcast_focus();
            }
            None => {}
        }
    }

    async fn startup(&mut self) -> Result<()> {
        if self.started {
            debug!("Core already started");
            return Ok(());
        }
        self.started = true;
        info!("Starting core with data in {}", self.config.data_dir.display());

        self.windows.show_dashboard();

        let settings = self.settings.get()?;
        if settings.restore_last_notes {
            let pinned = self.notes.pinned_notes()?;
            info!("Restoring {} pinned notes", pinned.len());
            for note in &pinned {
                self.windows
                    .open_or_focus(WindowRole::Note(note.id.clone()), Some(note));
            }
        }

        if let Err(e) = self.backups.reconfigure(&settings).await {
            warn!("Automatic backups unavailable: {}", e);
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down core");

        self.focus.stop();
        self.windows.close_all();
        if let Err(e) = self.backups.stop().await {
            error!("Failed to stop backup scheduler: {}", e);
        }
    }
}

struct Dispatcher {
    core: Core,
    messages: mpsc::Receiver<Message>,
    ticks: mpsc::UnboundedReceiver<FocusTick>,
}

impl Dispatcher {
    async fn run(mut self) {
        info!("Dispatcher running");

        loop {
            tokio::select! {
                message = self.messages.recv() => match message {
                    Some(message) => {
                        if self.dispatch(message).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All dispatcher handles dropped");
                        self.core.shutdown().await;
                        break;
                    }
                },
                Some(tick) = self.ticks.recv() => self.core.on_focus_tick(tick),
            }
        }

        info!("Dispatcher stopped");
    }

    /// Handles one message. Returns true when the loop should end.
    async fn dispatch(&mut self, message: Message) -> bool {
        let Message {
            origin,
            request,
            reply,
        } = message;
        let quit = matches!(request, Request::AppQuit);

        trace!("Dispatching {:?} from {}", request, origin);
        let result = self.core.handle(origin, request).await;

        match reply {
            Some(reply) => {
                if reply.send(result).is_err() {
                    debug!("Requester from {} went away before the reply", origin);
                }
            }
            None => {
                if let Err(e) = result {
                    warn!("Event from {} failed: {}", origin, e);
                }
            }
        }
        quit
    }
}

/// Starts the dispatcher task. Must be called from within a tokio runtime.
///
/// The task ends after `app.quit` or once every handle is dropped; in both
/// cases all windows are closed and background work is stopped first.
pub fn spawn_dispatcher(
    config: Config,
    store: Arc<PersistentStore>,
    backend: Arc<dyn WindowBackend>,
) -> (DispatcherHandle, JoinHandle<()>) {
    let (tick_tx, ticks) = mpsc::unbounded_channel();
    let (tx, messages) = mpsc::channel(DISPATCH_QUEUE);

    let settings = SettingsManager::new(Arc::clone(&store));
    let focus = FocusSessionManager::new(tick_tx);
    let focus_status = focus.subscribe_status();

    let core = Core {
        notes: NoteStore::new(Arc::clone(&store), settings.clone()),
        backups: BackupScheduler::new(config.backup_dir.clone(), &store),
        windows: WindowRegistry::new(backend),
        settings,
        focus,
        config,
        started: false,
        shut_down: false,
    };

    let task = tokio::spawn(
        Dispatcher {
            core,
            messages,
            ticks,
        }
        .run(),
    );

    (DispatcherHandle { tx, focus_status }, task)
}

/// Cloneable sender side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Message>,
    focus_status: watch::Receiver<FocusStatus>,
}

impl DispatcherHandle {
    /// Sends `request` and waits for its result.
    pub async fn request(&self, origin: Origin, request: Request) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message {
                origin,
                request,
                reply: Some(reply),
            })
            .await
            .map_err(|_| StickyError::DispatcherClosed)?;

        rx.await.map_err(|_| StickyError::DispatcherClosed)?
    }

    /// Sends `request` without waiting for it to be handled. Failures are
    /// logged by the dispatcher and never reach the sender.
    pub async fn emit(&self, origin: Origin, request: Request) {
        let message = Message {
            origin,
            request,
            reply: None,
        };
        if self.tx.send(message).await.is_err() {
            debug!("Dispatcher closed, dropping event from {}", origin);
        }
    }

    /// Client that sends as window `id`.
    pub fn for_window(&self, id: WindowId) -> Client {
        Client {
            handle: self.clone(),
            origin: Origin::Window(id),
        }
    }

    /// Client for senders that are not windows.
    pub fn external(&self) -> Client {
        Client {
            handle: self.clone(),
            origin: Origin::External,
        }
    }

    /// Coarse focus status, updated on state transitions only.
    pub fn focus_status(&self) -> watch::Receiver<FocusStatus> {
        self.focus_status.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A [`DispatcherHandle`] bound to one sender.
#[derive(Clone)]
pub struct Client {
    handle: DispatcherHandle,
    origin: Origin,
}

impl Client {
    pub async fn request(&self, request: Request) -> Result<Response> {
        self.handle.request(self.origin, request).await
    }

    /// Takes a request as a window sends it over the wire and answers with a
    /// serializable reply. A message that does not parse is answered with a
    /// serialization error instead of reaching the dispatcher.
    pub async fn request_json(&self, raw: &str) -> Reply {
        match serde_json::from_str::<Request>(raw) {
            Ok(request) => self.request(request).await.into(),
            Err(e) => {
                warn!("Rejecting malformed request from {}: {}", self.origin, e);
                Reply::Error(ErrorPayload::from(&StickyError::Serialization(e)))
            }
        }
    }

    pub async fn emit(&self, request: Request) {
        self.handle.emit(self.origin, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_use_dotted_command_names() {
        let json = serde_json::to_value(Request::NoteUpdate {
            id: "n1".into(),
            patch: NotePatch::title("Hello"),
        })
        .unwrap();
        assert_eq!(json["command"], "note.update");
        assert_eq!(json["args"]["patch"]["title"], "Hello");

        let parsed: Request = serde_json::from_str(r#"{"command":"note.getAll"}"#).unwrap();
        assert_eq!(parsed, Request::NoteGetAll);

        let parsed: Request =
            serde_json::from_str(r#"{"command":"window.togglePin","args":{"target":"current"}}"#)
                .unwrap();
        assert_eq!(
            parsed,
            Request::WindowTogglePin {
                target: WindowTarget::Current
            }
        );

        let parsed: Request = serde_json::from_str(
            r#"{"command":"window.createOrFocusNote","args":{"noteId":"abc"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            Request::WindowCreateOrFocusNote {
                note_id: Some("abc".into())
            }
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"command":"note.explode"}"#).is_err());
    }

    #[tokio::test]
    async fn closed_dispatcher_reports_error() {
        let (handle, task) = spawn_dispatcher(
            Config::with_data_dir("/nonexistent"),
            Arc::new(PersistentStore::in_memory()),
            Arc::new(crate::HeadlessBackend),
        );

        let client = handle.external();
        assert!(!handle.is_closed());
        client.request(Request::AppQuit).await.unwrap();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert!(matches!(
            client.request(Request::NoteGetAll).await,
            Err(StickyError::DispatcherClosed)
        ));
    }

    #[tokio::test]
    async fn json_requests_get_json_replies() {
        let (handle, _task) = spawn_dispatcher(
            Config::with_data_dir("/nonexistent"),
            Arc::new(PersistentStore::in_memory()),
            Arc::new(crate::HeadlessBackend),
        );
        let client = handle.external();

        let reply = client
            .request_json(r#"{"command":"note.create","args":{"title":"wire"}}"#)
            .await;
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["ok"]["type"], "note");
        assert_eq!(value["ok"]["value"]["title"], "wire");

        let reply = client
            .request_json(r#"{"command":"window.togglePin","args":{"target":{"id":99}}}"#)
            .await;
        let Reply::Error(payload) = reply else {
            panic!("window 99 does not exist");
        };
        assert_eq!(payload.kind, "windowNotFound");

        let reply = client.request_json(r#"{"command":"note.explode"}"#).await;
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["error"]["kind"], "serialization");
        assert!(value["error"]["message"].is_string());
    }
}

//! Window roles, per-role defaults and the seam to whatever draws windows.
//!
//! The core never touches OS windows itself. It keeps its own model of every
//! window (role, chrome flags, event channel) and tells a [`WindowBackend`]
//! what to do with the real thing.
use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Note, Settings, TimerState};

/// Registry-assigned identity of a live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which logical window a handle represents. At most one live window exists
/// per value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "noteId", rename_all = "camelCase")]
pub enum WindowRole {
    Dashboard,
    Settings,
    Note(String),
    FocusWidget,
}

impl WindowRole {
    pub fn note_id(&self) -> Option<&str> {
        match self {
            WindowRole::Note(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for WindowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowRole::Dashboard => write!(f, "dashboard"),
            WindowRole::Settings => write!(f, "settings"),
            WindowRole::Note(id) => write!(f, "note:{}", id),
            WindowRole::FocusWidget => write!(f, "focus-widget"),
        }
    }
}

/// Window flags the core controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowChrome {
    pub visible: bool,
    pub always_on_top: bool,
    pub skip_taskbar: bool,
    /// Content ignores the mouse; moving and resizing still work
    pub ignore_mouse_events: bool,
    pub resizable: bool,
    pub movable: bool,
}

impl Default for WindowChrome {
    fn default() -> Self {
        Self {
            visible: true,
            always_on_top: false,
            skip_taskbar: false,
            ignore_mouse_events: false,
            resizable: true,
            movable: true,
        }
    }
}

/// Geometry and behavior a window is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSpec {
    pub role: WindowRole,
    pub width: f64,
    pub height: f64,
    pub min_width: f64,
    pub min_height: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub background: String,
    pub frameless: bool,
    pub modal: bool,
    pub parent: Option<WindowId>,
    pub chrome: WindowChrome,
}

impl WindowSpec {
    /// Role-specific defaults. For note windows, pin/lock flags and bounds are
    /// taken from `note` when given.
    pub fn for_role(role: WindowRole, note: Option<&Note>, dashboard: Option<WindowId>) -> Self {
        let base = |role: WindowRole, width: f64, height: f64, min_width: f64, min_height: f64| {
            WindowSpec {
                role,
                width,
                height,
                min_width,
                min_height,
                x: None,
                y: None,
                background: "#0B0C0D".to_string(),
                frameless: true,
                modal: false,
                parent: None,
                chrome: WindowChrome::default(),
            }
        };

        match role {
            WindowRole::Dashboard => base(role, 380.0, 580.0, 350.0, 400.0),
            WindowRole::Settings => WindowSpec {
                modal: true,
                parent: dashboard,
                ..base(role, 800.0, 600.0, 600.0, 400.0)
            },
            WindowRole::Note(_) => {
                let mut spec = base(role, 280.0, 220.0, 200.0, 120.0);
                spec.background = "#111214".to_string();
                if let Some(note) = note {
                    spec.x = Some(note.position.x);
                    spec.y = Some(note.position.y);
                    spec.width = note.position.width;
                    spec.height = note.position.height;
                    spec.background = note.color.clone();
                    spec.chrome.always_on_top = note.pinned;
                    spec.chrome.skip_taskbar = note.pinned;
                    spec.chrome.ignore_mouse_events = note.locked;
                }
                spec
            }
            WindowRole::FocusWidget => {
                let mut spec = base(role, 300.0, 360.0, 240.0, 280.0);
                spec.chrome.always_on_top = true;
                spec.chrome.skip_taskbar = true;
                spec.chrome.resizable = false;
                spec
            }
        }
    }
}

/// Events the core pushes to windows. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WindowEvent {
    #[serde(rename = "note.updated")]
    NoteUpdated(Note),
    #[serde(rename = "note.deleted")]
    NoteDeleted { id: String },
    #[serde(rename = "note.lockStateChanged", rename_all = "camelCase")]
    LockStateChanged { note_id: String, locked: bool },
    #[serde(rename = "settings.updated")]
    SettingsUpdated(Settings),
    #[serde(rename = "focus.tick")]
    FocusTick { remaining: u32, state: TimerState },
}

impl WindowEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            WindowEvent::NoteUpdated(_) => "note.updated",
            WindowEvent::NoteDeleted { .. } => "note.deleted",
            WindowEvent::LockStateChanged { .. } => "note.lockStateChanged",
            WindowEvent::SettingsUpdated(_) => "settings.updated",
            WindowEvent::FocusTick { .. } => "focus.tick",
        }
    }
}

/// Receiving half of a window's event channel. Dropping it marks the window
/// as gone.
pub type WindowEvents = mpsc::UnboundedReceiver<WindowEvent>;

/// Whatever actually draws windows (a webview host, a GUI toolkit, nothing).
pub trait WindowBackend: Send + Sync {
    /// Create the real window. `events` belongs to the new window.
    fn open(&self, id: WindowId, spec: &WindowSpec, events: WindowEvents);

    /// Show and bring to front.
    fn show(&self, id: WindowId);

    fn hide(&self, id: WindowId);

    fn apply_chrome(&self, id: WindowId, chrome: &WindowChrome);

    fn destroy(&self, id: WindowId);
}

/// Backend with no screen: every window just drains and logs its events.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct HeadlessBackend;

impl WindowBackend for HeadlessBackend {
    fn open(&self, id: WindowId, spec: &WindowSpec, mut events: WindowEvents) {
        debug!("[headless] open window {} as {}", id, spec.role);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                trace!("[headless] window {} received {}", id, event.name());
            }
            trace!("[headless] window {} event stream closed", id);
        });
    }

    fn show(&self, id: WindowId) {
        debug!("[headless] show window {}", id);
    }

    fn hide(&self, id: WindowId) {
        debug!("[headless] hide window {}", id);
    }

    fn apply_chrome(&self, id: WindowId, chrome: &WindowChrome) {
        debug!("[headless] window {} chrome {:?}", id, chrome);
    }

    fn destroy(&self, id: WindowId) {
        debug!("[headless] destroy window {}", id);
    }
}

/// What a [`ChannelBackend`] forwards to its host.
#[derive(Debug)]
pub enum BackendCommand {
    Open {
        id: WindowId,
        spec: WindowSpec,
        events: WindowEvents,
    },
    Show(WindowId),
    Hide(WindowId),
    ApplyChrome(WindowId, WindowChrome),
    Destroy(WindowId),
}

/// Forwards every backend call over a channel, for hosts that run their own
/// event loop (and for tests).
pub struct ChannelBackend {
    tx: mpsc::UnboundedSender<BackendCommand>,
}

impl ChannelBackend {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BackendCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, command: BackendCommand) {
        if self.tx.send(command).is_err() {
            trace!("Window host is gone, dropping backend command");
        }
    }
}

impl WindowBackend for ChannelBackend {
    fn open(&self, id: WindowId, spec: &WindowSpec, events: WindowEvents) {
        self.forward(BackendCommand::Open {
            id,
            spec: spec.clone(),
            events,
        });
    }

    fn show(&self, id: WindowId) {
        self.forward(BackendCommand::Show(id));
    }

    fn hide(&self, id: WindowId) {
        self.forward(BackendCommand::Hide(id));
    }

    fn apply_chrome(&self, id: WindowId, chrome: &WindowChrome) {
        self.forward(BackendCommand::ApplyChrome(id, *chrome));
    }

    fn destroy(&self, id: WindowId) {
        self.forward(BackendCommand::Destroy(id));
    }
}

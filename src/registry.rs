//! Window Registry: one authoritative map from role to live window.
//!
//! # Invariants
//! - At most one live window per [`WindowRole`] value.
//! - `roles` and `windows` always describe the same set of windows.
//! - A window whose event receiver was dropped is treated as gone and purged
//!   the next time it is looked up or broadcast to.
use std::{collections::HashMap, sync::Arc};

use log::{debug, info, trace};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{Note, WindowBackend, WindowChrome, WindowEvent, WindowId, WindowRole, WindowSpec};

struct WindowEntry {
    role: WindowRole,
    chrome: WindowChrome,
    events: mpsc::UnboundedSender<WindowEvent>,
}

impl WindowEntry {
    fn is_alive(&self) -> bool {
        !self.events.is_closed()
    }
}

/// Read-only view of a registered window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub id: WindowId,
    pub role: WindowRole,
    pub chrome: WindowChrome,
}

pub struct WindowRegistry {
    backend: Arc<dyn WindowBackend>,
    windows: HashMap<WindowId, WindowEntry>,
    roles: HashMap<WindowRole, WindowId>,
    next_id: u32,
    quitting: bool,
}

impl WindowRegistry {
    pub fn new(backend: Arc<dyn WindowBackend>) -> Self {
        Self {
            backend,
            windows: HashMap::new(),
            roles: HashMap::new(),
            next_id: 1,
            quitting: false,
        }
    }

    /// Brings the window for `role` to front, creating it first if needed.
    ///
    /// `note` seeds a new note window's bounds and pin/lock chrome; it is
    /// ignored when the window already exists.
    pub fn open_or_focus(&mut self, role: WindowRole, note: Option<&Note>) -> WindowId {
        if let Some(id) = self.live_window(&role) {
            debug!("Focusing existing {} window {}", role, id);
            if let Some(entry) = self.windows.get_mut(&id) {
                entry.chrome.visible = true;
            }
            self.backend.show(id);
            return id;
        }

        let id = WindowId(self.next_id);
        self.next_id += 1;

        let dashboard = self.roles.get(&WindowRole::Dashboard).copied();
        let spec = WindowSpec::for_role(role.clone(), note, dashboard);
        let (tx, rx) = mpsc::unbounded_channel();

        self.windows.insert(
            id,
            WindowEntry {
                role: role.clone(),
                chrome: spec.chrome,
                events: tx,
            },
        );
        self.roles.insert(role.clone(), id);
        self.backend.open(id, &spec, rx);

        info!("Opened {} window {}", role, id);
        id
    }

    pub fn is_open(&self, role: &WindowRole) -> bool {
        self.roles
            .get(role)
            .and_then(|id| self.windows.get(id))
            .is_some_and(WindowEntry::is_alive)
    }

    /// Window currently registered for `role`.
    pub fn window_for(&self, role: &WindowRole) -> Option<WindowId> {
        self.roles
            .get(role)
            .copied()
            .filter(|id| self.windows.get(id).is_some_and(WindowEntry::is_alive))
    }

    /// Role of the window that issued a command.
    pub fn resolve_sender_role(&self, sender: WindowId) -> Option<WindowRole> {
        self.windows
            .get(&sender)
            .filter(|entry| entry.is_alive())
            .map(|entry| entry.role.clone())
    }

    /// Note shown by window `id`, if it is a note window.
    pub fn note_id_for(&self, id: WindowId) -> Option<String> {
        self.windows
            .get(&id)
            .and_then(|entry| entry.role.note_id().map(str::to_string))
    }

    pub fn snapshot(&self, id: WindowId) -> Option<WindowSnapshot> {
        self.windows.get(&id).map(|entry| WindowSnapshot {
            id,
            role: entry.role.clone(),
            chrome: entry.chrome,
        })
    }

    /// Every registered window, ordered by id.
    pub fn open_windows(&self) -> Vec<WindowSnapshot> {
        let mut ids: Vec<WindowId> = self.windows.keys().copied().collect();
        ids.sort();
        ids.into_iter().filter_map(|id| self.snapshot(id)).collect()
    }

    /// Closes the window for `role`. Returns whether one was registered.
    pub fn close(&mut self, role: &WindowRole) -> bool {
        match self.roles.get(role).copied() {
            Some(id) => self.close_window(id),
            None => false,
        }
    }

    /// Closes window `id`. The dashboard is only hidden unless the app is
    /// shutting down.
    pub fn close_window(&mut self, id: WindowId) -> bool {
        let Some(entry) = self.windows.get(&id) else {
            debug!("Close requested for unknown window {}", id);
            return false;
        };

        if entry.role == WindowRole::Dashboard && !self.quitting {
            debug!("Hiding dashboard instead of closing it");
            self.hide_dashboard();
            return true;
        }

        self.forget(id);
        self.backend.destroy(id);
        true
    }

    /// Closes every window in shutdown order: notes, settings, focus widget,
    /// dashboard last. The dashboard's hide-on-close is bypassed.
    pub fn close_all(&mut self) {
        info!("Closing all {} windows", self.windows.len());
        self.quitting = true;

        let mut notes: Vec<WindowRole> = self
            .roles
            .keys()
            .filter(|role| matches!(role, WindowRole::Note(_)))
            .cloned()
            .collect();
        notes.sort_by(|a, b| a.note_id().cmp(&b.note_id()));

        for role in notes
            .into_iter()
            .chain([WindowRole::Settings, WindowRole::FocusWidget, WindowRole::Dashboard])
        {
            self.close(&role);
        }
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub fn show_dashboard(&mut self) -> WindowId {
        self.open_or_focus(WindowRole::Dashboard, None)
    }

    pub fn hide_dashboard(&mut self) {
        if let Some(id) = self.window_for(&WindowRole::Dashboard) {
            self.set_visible(id, false);
        }
    }

    pub fn toggle_dashboard(&mut self) {
        if self.is_dashboard_visible() {
            self.hide_dashboard();
        } else {
            self.show_dashboard();
        }
    }

    pub fn is_dashboard_visible(&self) -> bool {
        self.window_for(&WindowRole::Dashboard)
            .and_then(|id| self.windows.get(&id))
            .is_some_and(|entry| entry.chrome.visible)
    }

    pub fn hide_all_notes(&mut self) {
        for id in self.note_windows() {
            self.set_visible(id, false);
        }
    }

    pub fn show_all_notes(&mut self) {
        for id in self.note_windows() {
            self.set_visible(id, true);
        }
    }

    /// Hides every note window if any is visible, otherwise shows them all.
    pub fn toggle_all_notes(&mut self) {
        let any_visible = self
            .note_windows()
            .iter()
            .any(|id| self.windows.get(id).is_some_and(|e| e.chrome.visible));

        if any_visible {
            self.hide_all_notes();
        } else {
            self.show_all_notes();
        }
    }

    /// Pinned windows stay on top and out of the taskbar.
    pub fn set_pinned_chrome(&mut self, id: WindowId, pinned: bool) -> bool {
        self.update_chrome(id, |chrome| {
            chrome.always_on_top = pinned;
            chrome.skip_taskbar = pinned;
        })
    }

    /// Locked windows pass mouse events through; move/resize stay enabled.
    pub fn set_locked_chrome(&mut self, id: WindowId, locked: bool) -> bool {
        self.update_chrome(id, |chrome| {
            chrome.ignore_mouse_events = locked;
            chrome.movable = true;
            chrome.resizable = true;
        })
    }

    /// Delivers `event` to every live window. Windows that went away are
    /// skipped and forgotten. Returns the number of deliveries.
    pub fn broadcast(&mut self, event: WindowEvent) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, entry) in &self.windows {
            match entry.events.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(*id),
            }
        }

        for id in dead {
            debug!("Window {} is gone, dropping it from the registry", id);
            self.forget(id);
        }

        trace!("Broadcast {} to {} windows", event.name(), delivered);
        delivered
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn live_window(&mut self, role: &WindowRole) -> Option<WindowId> {
        let id = *self.roles.get(role)?;
        if self.windows.get(&id).is_some_and(WindowEntry::is_alive) {
            return Some(id);
        }

        debug!("Window {} for {} was destroyed, forgetting it", id, role);
        self.forget(id);
        None
    }

    fn note_windows(&self) -> Vec<WindowId> {
        self.roles
            .iter()
            .filter(|(role, _)| matches!(role, WindowRole::Note(_)))
            .map(|(_, id)| *id)
            .collect()
    }

    fn set_visible(&mut self, id: WindowId, visible: bool) {
        let Some(entry) = self.windows.get_mut(&id) else {
            return;
        };
        entry.chrome.visible = visible;
        if visible {
            self.backend.show(id);
        } else {
            self.backend.hide(id);
        }
    }

    fn update_chrome(&mut self, id: WindowId, f: impl FnOnce(&mut WindowChrome)) -> bool {
        let Some(entry) = self.windows.get_mut(&id) else {
            return false;
        };
        f(&mut entry.chrome);
        self.backend.apply_chrome(id, &entry.chrome);
        true
    }

    fn forget(&mut self, id: WindowId) {
        if let Some(entry) = self.windows.remove(&id) {
            if self.roles.get(&entry.role) == Some(&id) {
                self.roles.remove(&entry.role);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendCommand, ChannelBackend, NotePatch};

    fn registry() -> (WindowRegistry, mpsc::UnboundedReceiver<BackendCommand>) {
        let (backend, rx) = ChannelBackend::new();
        (WindowRegistry::new(Arc::new(backend)), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BackendCommand>) -> Vec<BackendCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[test]
    fn same_note_role_yields_same_window() {
        let (mut reg, _host) = registry();
        let a = reg.open_or_focus(WindowRole::Note("a".into()), None);
        let again = reg.open_or_focus(WindowRole::Note("a".into()), None);
        let b = reg.open_or_focus(WindowRole::Note("b".into()), None);

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn note_window_inherits_pin_lock_and_bounds() {
        let (mut reg, mut host) = registry();
        let mut note = Note::new(NotePatch::pinned(true), "#222222");
        note.locked = true;

        let id = reg.open_or_focus(WindowRole::Note(note.id.clone()), Some(&note));
        let chrome = reg.snapshot(id).unwrap().chrome;
        assert!(chrome.always_on_top && chrome.skip_taskbar && chrome.ignore_mouse_events);

        match drain(&mut host).remove(0) {
            BackendCommand::Open { spec, .. } => {
                assert_eq!(spec.x, Some(note.position.x));
                assert_eq!(spec.width, note.position.width);
                assert_eq!(spec.background, "#222222");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn dashboard_close_hides_until_shutdown() {
        let (mut reg, _host) = registry();
        let id = reg.show_dashboard();

        assert!(reg.close(&WindowRole::Dashboard));
        assert!(reg.is_open(&WindowRole::Dashboard));
        assert!(!reg.is_dashboard_visible());

        assert_eq!(reg.show_dashboard(), id);
        assert!(reg.is_dashboard_visible());

        reg.close_all();
        assert!(!reg.is_open(&WindowRole::Dashboard));
        assert!(reg.is_empty());
    }

    #[test]
    fn close_all_orders_dashboard_last() {
        let (mut reg, mut host) = registry();
        let dash = reg.show_dashboard();
        let note = reg.open_or_focus(WindowRole::Note("n".into()), None);
        let settings = reg.open_or_focus(WindowRole::Settings, None);
        drain(&mut host);

        reg.close_all();
        let destroyed: Vec<WindowId> = drain(&mut host)
            .into_iter()
            .filter_map(|cmd| match cmd {
                BackendCommand::Destroy(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![note, settings, dash]);
    }

    #[test]
    fn broadcast_skips_destroyed_windows() {
        let (mut reg, mut host) = registry();
        reg.open_or_focus(WindowRole::Note("a".into()), None);
        reg.open_or_focus(WindowRole::Note("b".into()), None);

        let mut receivers: Vec<_> = drain(&mut host)
            .into_iter()
            .filter_map(|cmd| match cmd {
                BackendCommand::Open { events, .. } => Some(events),
                _ => None,
            })
            .collect();
        // the first window goes away without telling the registry
        drop(receivers.remove(0));

        let delivered = reg.broadcast(WindowEvent::NoteDeleted { id: "x".into() });
        assert_eq!(delivered, 1);
        assert_eq!(reg.len(), 1);
        assert_eq!(
            receivers[0].try_recv().unwrap(),
            WindowEvent::NoteDeleted { id: "x".into() }
        );
    }

    #[test]
    fn destroyed_window_is_recreated_on_open() {
        let (mut reg, mut host) = registry();
        let first = reg.open_or_focus(WindowRole::Settings, None);
        drop(drain(&mut host));

        assert!(!reg.is_open(&WindowRole::Settings));
        let second = reg.open_or_focus(WindowRole::Settings, None);
        assert_ne!(first, second);
    }

    #[test]
    fn sender_role_resolution() {
        let (mut reg, _host) = registry();
        let id = reg.open_or_focus(WindowRole::Note("abc".into()), None);

        assert_eq!(
            reg.resolve_sender_role(id),
            Some(WindowRole::Note("abc".into()))
        );
        assert_eq!(reg.note_id_for(id).as_deref(), Some("abc"));
        assert_eq!(reg.resolve_sender_role(WindowId(999)), None);
    }

    #[test]
    fn lock_keeps_window_movable() {
        let (mut reg, _host) = registry();
        let id = reg.open_or_focus(WindowRole::Note("n".into()), None);

        assert!(reg.set_locked_chrome(id, true));
        let chrome = reg.snapshot(id).unwrap().chrome;
        assert!(chrome.ignore_mouse_events && chrome.movable && chrome.resizable);
    }

    #[test]
    fn toggle_all_notes_hides_then_shows() {
        let (mut reg, _host) = registry();
        let a = reg.open_or_focus(WindowRole::Note("a".into()), None);
        let b = reg.open_or_focus(WindowRole::Note("b".into()), None);

        reg.toggle_all_notes();
        assert!(!reg.snapshot(a).unwrap().chrome.visible);
        assert!(!reg.snapshot(b).unwrap().chrome.visible);

        reg.toggle_all_notes();
        assert!(reg.snapshot(a).unwrap().chrome.visible);
    }

    #[test]
    fn open_windows_lists_by_id() {
        let (mut reg, _host) = registry();
        let dash = reg.show_dashboard();
        let note = reg.open_or_focus(WindowRole::Note("n".into()), None);

        let roles: Vec<(WindowId, WindowRole)> = reg
            .open_windows()
            .into_iter()
            .map(|w| (w.id, w.role))
            .collect();
        assert_eq!(
            roles,
            vec![(dash, WindowRole::Dashboard), (note, WindowRole::Note("n".into()))]
        );
        assert!(!reg.is_quitting());
    }
}

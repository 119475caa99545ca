//! Focus Session Manager.
//!
//! `idle -> running -> {paused <-> running} -> completed -> idle`, plus
//! `running/paused -> idle` on stop. While running, a ticker task sends one
//! [`FocusTick`] per second into the dispatcher, which feeds it back through
//! [`FocusSessionManager::on_tick`]. Each ticker carries a generation number
//! so a tick already queued when the session was paused or stopped is
//! ignored.
use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Duration},
};

use crate::helper::format_clock;

/// Session length used when none is given and after a stop.
pub const DEFAULT_FOCUS_MINUTES: u32 = 25;

/// Which visualization the focus widget draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    #[default]
    Plant,
    Blob,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    /// Seconds left
    pub remaining: u32,
    pub mode: FocusMode,
    pub state: TimerState,
}

impl FocusSession {
    pub fn idle(duration_minutes: u32, mode: FocusMode) -> Self {
        Self {
            is_active: false,
            started_at: None,
            duration_minutes,
            remaining: duration_minutes * 60,
            mode,
            state: TimerState::Idle,
        }
    }

    /// Fraction of the session already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let total = self.duration_minutes * 60;
        if total == 0 {
            return 0.0;
        }
        1.0 - f64::from(self.remaining) / f64::from(total)
    }
}

impl Default for FocusSession {
    fn default() -> Self {
        Self::idle(DEFAULT_FOCUS_MINUTES, FocusMode::default())
    }
}

/// Coarse view of the session for low-frequency displays such as a tray
/// tooltip. Only republished on state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusStatus {
    pub active: bool,
    pub paused: bool,
    pub remaining: u32,
}

impl FocusStatus {
    fn of(session: &FocusSession) -> Self {
        Self {
            active: session.is_active,
            paused: session.state == TimerState::Paused,
            remaining: session.remaining,
        }
    }

    pub fn tooltip(&self) -> String {
        match (self.active, self.paused) {
            (true, true) => format!("StickyNotes - Focus paused ({})", format_clock(self.remaining)),
            (true, false) => format!("StickyNotes - Focus {}", format_clock(self.remaining)),
            _ => "StickyNotes".to_string(),
        }
    }
}

/// One scheduled tick from the ticker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTick {
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ticked { remaining: u32 },
    Completed,
}

pub struct FocusSessionManager {
    session: FocusSession,
    ticker: Option<JoinHandle<()>>,
    generation: u64,
    tick_tx: mpsc::UnboundedSender<FocusTick>,
    status_tx: watch::Sender<FocusStatus>,
}

impl FocusSessionManager {
    /// Ticks go to `tick_tx`; whoever owns the receiver must hand them back
    /// to [`on_tick`](Self::on_tick).
    pub fn new(tick_tx: mpsc::UnboundedSender<FocusTick>) -> Self {
        let session = FocusSession::default();
        let (status_tx, _) = watch::channel(FocusStatus::of(&session));

        Self {
            session,
            ticker: None,
            generation: 0,
            tick_tx,
            status_tx,
        }
    }

    pub fn session(&self) -> &FocusSession {
        &self.session
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FocusStatus> {
        self.status_tx.subscribe()
    }

    /// Starts a new session. A no-op returning `false` while one is running.
    pub fn start(&mut self, duration_minutes: u32, mode: FocusMode) -> bool {
        if self.session.state == TimerState::Running {
            debug!("Focus session already running, ignoring start");
            return false;
        }

        let duration_minutes = duration_minutes.max(1);
        self.session = FocusSession {
            is_active: true,
            started_at: Some(Utc::now()),
            duration_minutes,
            remaining: duration_minutes * 60,
            mode,
            state: TimerState::Running,
        };
        self.spawn_ticker();
        self.publish_status();

        info!("Focus session started: {} minutes ({:?})", duration_minutes, mode);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.session.state != TimerState::Running {
            return false;
        }

        self.cancel_ticker();
        self.session.state = TimerState::Paused;
        self.publish_status();

        info!("Focus session paused at {}", format_clock(self.session.remaining));
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.session.state != TimerState::Paused {
            return false;
        }

        self.session.state = TimerState::Running;
        self.spawn_ticker();
        self.publish_status();

        info!("Focus session resumed at {}", format_clock(self.session.remaining));
        true
    }

    /// Back to a default idle session, keeping the mode.
    pub fn stop(&mut self) -> bool {
        if self.session.state == TimerState::Idle {
            return false;
        }

        self.cancel_ticker();
        self.session = FocusSession::idle(DEFAULT_FOCUS_MINUTES, self.session.mode);
        self.publish_status();

        info!("Focus session stopped");
        true
    }

    /// Applies one tick. Stale ticks and ticks outside `running` yield `None`.
    pub fn on_tick(&mut self, tick: FocusTick) -> Option<TickOutcome> {
        if tick.generation != self.generation || self.session.state != TimerState::Running {
            trace!("Ignoring stale focus tick {}", tick.generation);
            return None;
        }

        self.session.remaining = self.session.remaining.saturating_sub(1);
        if self.session.remaining > 0 {
            return Some(TickOutcome::Ticked {
                remaining: self.session.remaining,
            });
        }

        self.cancel_ticker();
        // stays active so the finished clock is shown until the session is stopped
        self.session.state = TimerState::Completed;
        self.publish_status();

        info!("Focus session completed");
        Some(TickOutcome::Completed)
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();
        self.generation += 1;

        let generation = self.generation;
        let tick_tx = self.tick_tx.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick fires immediately

            loop {
                interval.tick().await;
                if tick_tx.send(FocusTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_ticker(&mut self) {
        if let Some(task) = self.ticker.take() {
            task.abort();
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(FocusStatus::of(&self.session));
    }
}

impl Drop for FocusSessionManager {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (FocusSessionManager, mpsc::UnboundedReceiver<FocusTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FocusSessionManager::new(tx), rx)
    }

    async fn next_tick(rx: &mut mpsc::UnboundedReceiver<FocusTick>) -> Option<FocusTick> {
        time::timeout(Duration::from_secs(5), rx.recv()).await.ok().flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn running_session_counts_down() {
        let (mut focus, mut rx) = manager();
        assert!(focus.start(1, FocusMode::Blob));

        let tick = next_tick(&mut rx).await.unwrap();
        assert_eq!(focus.on_tick(tick), Some(TickOutcome::Ticked { remaining: 59 }));
        assert_eq!(focus.session().state, TimerState::Running);
        assert_eq!(focus.session().mode, FocusMode::Blob);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_a_noop() {
        let (mut focus, _rx) = manager();
        assert!(focus.start(10, FocusMode::Plant));
        assert!(!focus.start(20, FocusMode::Blob));
        assert_eq!(focus.session().duration_minutes, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_ticker_and_drops_stale_ticks() {
        let (mut focus, mut rx) = manager();
        focus.start(1, FocusMode::Plant);
        let tick = next_tick(&mut rx).await.unwrap();

        assert!(focus.pause());
        assert!(!focus.pause());
        assert_eq!(focus.on_tick(tick), None);
        assert!(next_tick(&mut rx).await.is_none());

        assert!(focus.resume());
        let fresh = next_tick(&mut rx).await.unwrap();
        assert_eq!(focus.on_tick(tick), None);
        assert_eq!(focus.on_tick(fresh), Some(TickOutcome::Ticked { remaining: 59 }));
    }

    #[tokio::test(start_paused = true)]
    async fn reaching_zero_completes_and_stops_ticking() {
        let (mut focus, mut rx) = manager();
        focus.start(1, FocusMode::Plant);

        let mut outcome = None;
        for _ in 0..60 {
            let tick = next_tick(&mut rx).await.unwrap();
            outcome = focus.on_tick(tick);
        }

        assert_eq!(outcome, Some(TickOutcome::Completed));
        assert_eq!(focus.session().state, TimerState::Completed);
        assert_eq!(focus.session().remaining, 0);
        assert!(focus.session().is_active);
        assert_eq!(
            focus.subscribe_status().borrow().tooltip(),
            "StickyNotes - Focus 00:00"
        );
        assert!(next_tick(&mut rx).await.is_none());

        assert!(focus.stop());
        assert_eq!(focus.subscribe_status().borrow().tooltip(), "StickyNotes");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_to_default_keeping_mode() {
        let (mut focus, _rx) = manager();
        assert!(!focus.stop());

        focus.start(5, FocusMode::Blob);
        focus.pause();
        assert!(focus.stop());

        let session = focus.session();
        assert_eq!(session.state, TimerState::Idle);
        assert_eq!(session.duration_minutes, DEFAULT_FOCUS_MINUTES);
        assert_eq!(session.remaining, DEFAULT_FOCUS_MINUTES * 60);
        assert_eq!(session.mode, FocusMode::Blob);
    }

    #[tokio::test(start_paused = true)]
    async fn status_changes_only_on_transitions() {
        let (mut focus, mut rx) = manager();
        let mut status = focus.subscribe_status();
        assert_eq!(status.borrow_and_update().tooltip(), "StickyNotes");

        focus.start(1, FocusMode::Plant);
        assert!(status.has_changed().unwrap());
        assert_eq!(status.borrow_and_update().tooltip(), "StickyNotes - Focus 01:00");

        let tick = next_tick(&mut rx).await.unwrap();
        focus.on_tick(tick);
        assert!(!status.has_changed().unwrap());

        focus.pause();
        assert_eq!(
            status.borrow_and_update().tooltip(),
            "StickyNotes - Focus paused (00:59)"
        );
    }

    #[test]
    fn progress_is_elapsed_fraction() {
        let mut session = FocusSession::idle(1, FocusMode::Plant);
        assert_eq!(session.progress(), 0.0);
        session.remaining = 15;
        assert_eq!(session.progress(), 0.75);
    }
}

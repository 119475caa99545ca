// src/backup_scheduler.rs - Periodic backups of the store snapshot
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::{PersistentStore, Result, Settings, StickyError};

#[derive(Debug, Clone, Default)]
pub struct BackupSchedulerStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// Minutes between scheduled backups
    pub interval_minutes: u32,
    /// The time the last backup was created
    pub last_backup_time: Option<chrono::DateTime<Utc>>,
    /// The path to the last backup file
    pub last_backup_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum BackupCommand {
    /// Create a backup immediately and report where it went
    CreateBackupNow(oneshot::Sender<Result<PathBuf>>),
    /// Stop the backup scheduler
    Stop,
}

pub struct BackupScheduler {
    /// Where backups are written
    backup_dir: PathBuf,

    /// How many backups to keep
    max_backups: usize,

    /// Channel to send commands to the scheduler task
    command_tx: Option<mpsc::Sender<BackupCommand>>,

    /// Handle to the scheduler task
    scheduler_task: Option<JoinHandle<()>>,

    /// Current status, shared with the scheduler task
    status: Arc<Mutex<BackupSchedulerStatus>>,

    /// Weak reference to the store so the scheduler never keeps it alive
    store: Weak<PersistentStore>,
}

impl BackupScheduler {
    pub fn new(backup_dir: impl Into<PathBuf>, store: &Arc<PersistentStore>) -> Self {
        let backup_dir = backup_dir.into();
        info!("Initializing backup scheduler for {}", backup_dir.display());

        Self {
            backup_dir,
            max_backups: Settings::default().max_backups,
            command_tx: None,
            scheduler_task: None,
            status: Arc::new(Mutex::new(BackupSchedulerStatus::default())),
            store: Arc::downgrade(store),
        }
    }

    /// Starts (or restarts) the scheduler with a backup every
    /// `interval_minutes`, keeping the newest `max_backups` files.
    pub async fn start(&mut self, interval_minutes: u32, max_backups: usize) -> Result<()> {
        if self.scheduler_task.is_some() {
            self.stop().await?;
        }

        if self.store.upgrade().is_none() {
            error!("Failed to start backup scheduler - store is no longer available.");
            return Err(StickyError::ApplicationError {
                message: "Store reference is no longer valid.".to_string(),
            });
        }

        let interval_minutes = interval_minutes.max(1);
        self.max_backups = max_backups;
        info!(
            "Starting backup scheduler: every {} minutes, keeping {}",
            interval_minutes, max_backups
        );

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = Some(command_tx);

        let store = self.store.clone();
        let backup_dir = self.backup_dir.clone();
        let status = Arc::clone(&self.status);
        let period = Duration::from_secs(u64::from(interval_minutes) * 60);

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.tick().await; // Initial tick

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match run_backup(&store, &backup_dir, max_backups, &status).await {
                            Ok(path) => info!("Scheduled backup completed at {}", path.display()),
                            Err(e) => error!("Scheduled backup failed: {}", e),
                        }
                    }
                    cmd = command_rx.recv() => match cmd {
                        Some(BackupCommand::CreateBackupNow(reply)) => {
                            let result = run_backup(&store, &backup_dir, max_backups, &status).await;
                            match &result {
                                Ok(path) => info!("Manual backup completed at {}", path.display()),
                                Err(e) => error!("Manual backup failed: {}", e),
                            }
                            let _ = reply.send(result);
                        }
                        Some(BackupCommand::Stop) | None => {
                            info!("Backup scheduler stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.scheduler_task = Some(task);
        let mut status = self.status.lock().await;
        status.is_running = true;
        status.interval_minutes = interval_minutes;

        Ok(())
    }

    /// Stop the backup scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.scheduler_task.take() else {
            debug!("Backup scheduler is not running");
            return Ok(());
        };

        if let Some(command_tx) = self.command_tx.take() {
            if let Err(e) = command_tx.send(BackupCommand::Stop).await {
                error!("Failed to send stop command to backup scheduler: {}", e);
            }
        }

        if let Err(e) = task.await {
            let message = format!("Failed to stop backup scheduler: {}", e);
            error!("{}", message);
            return Err(StickyError::ApplicationError { message });
        }

        self.status.lock().await.is_running = false;
        info!("Backup scheduler stopped");
        Ok(())
    }

    /// Follows `autoBackup`, `backupInterval` and `maxBackups`.
    pub async fn reconfigure(&mut self, settings: &Settings) -> Result<()> {
        if settings.auto_backup {
            self.start(settings.backup_interval, settings.max_backups).await
        } else {
            self.max_backups = settings.max_backups;
            self.stop().await
        }
    }

    /// Create a backup immediately, regardless of the schedule. Works whether
    /// or not the scheduler is running.
    pub async fn create_backup_now(&self) -> Result<PathBuf> {
        let Some(command_tx) = &self.command_tx else {
            return run_backup(&self.store, &self.backup_dir, self.max_backups, &self.status).await;
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        command_tx
            .send(BackupCommand::CreateBackupNow(reply_tx))
            .await
            .map_err(|e| StickyError::ApplicationError {
                message: format!("Failed to send backup command: {}", e),
            })?;

        reply_rx.await.map_err(|_| StickyError::ApplicationError {
            message: "Backup scheduler stopped before replying".to_string(),
        })?
    }

    /// Get the current status of the backup scheduler
    pub async fn get_status(&self) -> BackupSchedulerStatus {
        self.status.lock().await.clone()
    }
}

async fn run_backup(
    store: &Weak<PersistentStore>,
    backup_dir: &Path,
    max_backups: usize,
    status: &Mutex<BackupSchedulerStatus>,
) -> Result<PathBuf> {
    let store = store.upgrade().ok_or_else(|| StickyError::ApplicationError {
        message: "Store reference is no longer valid.".to_string(),
    })?;
    let path = store.create_backup(backup_dir, max_backups)?;

    let mut status = status.lock().await;
    status.last_backup_time = Some(Utc::now());
    status.last_backup_path = Some(path.clone());
    Ok(path)
}

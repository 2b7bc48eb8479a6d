//! Termination handling.
//!
//! [`ShutdownCoordinator`] turns Ctrl+C or SIGTERM into a cancelled
//! [`CancellationToken`], then performs the ordered shutdown once the
//! scheduler has stopped: back up the persisted files, drain the fetch pool,
//! log the per-device counts and report the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pulsefeed_store::{BackupManager, BackupOutcome, DataPaths};

use crate::scheduler::{CycleScheduler, CycleState};

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Stopped on request.
    Interrupted,
    /// Stopped by a fatal error.
    Failed,
}

impl ExitStatus {
    /// Process exit code.
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Interrupted => 0,
            ExitStatus::Failed => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Coordinates signal handling and ordered shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    backup: BackupManager,
    files: Vec<PathBuf>,
}

impl ShutdownCoordinator {
    /// Coordinator backing up `files` through `backup`.
    pub fn new(backup: BackupManager, files: Vec<PathBuf>) -> Self {
        Self {
            token: CancellationToken::new(),
            backup,
            files,
        }
    }

    /// Coordinator for the standard set of persisted files.
    pub fn for_paths(paths: &DataPaths, offset: time::UtcOffset) -> Self {
        let files = paths
            .backup_sources()
            .iter()
            .map(|p| p.to_path_buf())
            .collect();
        Self::new(BackupManager::new(&paths.backup_dir, offset), files)
    }

    /// Token cancelled when shutdown is requested.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Files covered by the backup.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Spawn a task that triggers shutdown on Ctrl+C or SIGTERM.
    pub fn listen(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => this.trigger(),
                _ = this.token.cancelled() => {}
            }
        })
    }

    /// Back up every file now.
    pub fn backup(&self) -> Vec<BackupOutcome> {
        let outcomes = self.backup.backup_all(&self.files);
        let copied = outcomes.iter().filter(|o| o.is_copied()).count();
        info!(
            "Backed up {}/{} file(s) to {}",
            copied,
            outcomes.len(),
            self.backup.dir().display()
        );
        outcomes
    }

    /// Best-effort backup after a fatal error.
    pub fn backup_on_failure(&self, reason: &dyn std::fmt::Display) -> ExitStatus {
        error!("Fatal: {}", reason);
        self.backup();
        ExitStatus::Failed
    }

    /// Finish shutdown after the scheduler stopped.
    ///
    /// Order: backup, pool drain, outcome summary.
    pub async fn complete(&self, scheduler: &mut CycleScheduler, status: ExitStatus) -> ExitStatus {
        scheduler.set_state(CycleState::ShuttingDown);

        self.backup();
        scheduler.pool().shutdown().await;
        scheduler.aggregator().log_tallies();

        info!(
            "Shutdown complete after {} cycle(s), {} history record(s)",
            scheduler.cycles(),
            scheduler.history().len()
        );
        status
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!("Ctrl+C handler failed: {}", e);
                            term.recv().await;
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::offset;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Interrupted.code(), 0);
        assert_eq!(ExitStatus::Failed.code(), 1);
    }

    #[tokio::test]
    async fn test_trigger_cancels_token() {
        let dir = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::for_paths(&DataPaths::in_dir(dir.path()), offset!(+3));
        let token = coordinator.token();
        let listener = coordinator.listen();

        assert!(!coordinator.is_triggered());
        coordinator.trigger();
        token.cancelled().await;
        listener.await.unwrap();
        assert!(coordinator.is_triggered());
    }

    #[test]
    fn test_backup_on_failure_copies_existing_files() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        std::fs::write(&paths.registry, "[]").unwrap();

        let coordinator = ShutdownCoordinator::for_paths(&paths, offset!(+3));
        let status = coordinator.backup_on_failure(&"registry is empty");
        assert_eq!(status, ExitStatus::Failed);

        let backups: Vec<_> = std::fs::read_dir(&paths.backup_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("bracelets_bp_"));
    }
}

//! Timestamped backups of the persisted files.

use std::fs;
use std::path::{Path, PathBuf};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, warn};

use crate::fs::ensure_dir;

/// Suffix timestamp: `YYYYMMDD_HHMMSS`.
const SUFFIX_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupResult {
    /// Copied to the given path.
    Copied(PathBuf),
    /// The source file does not exist.
    Missing,
    /// The copy failed.
    Failed(String),
}

/// Backup result for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    /// File that was backed up.
    pub source: PathBuf,
    /// Result.
    pub result: BackupResult,
}

impl BackupOutcome {
    /// Whether the file was copied.
    pub fn is_copied(&self) -> bool {
        matches!(self.result, BackupResult::Copied(_))
    }
}

/// Copies files into `<dir>/<stem>_bp_<YYYYMMDD_HHMMSS>.<ext>`.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
    offset: UtcOffset,
}

impl BackupManager {
    /// Back up into `dir`, stamping names in `offset`.
    pub fn new<P: AsRef<Path>>(dir: P, offset: UtcOffset) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            offset,
        }
    }

    /// Backup directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Back up every file, stamped with the current time.
    pub fn backup_all<P: AsRef<Path>>(&self, files: &[P]) -> Vec<BackupOutcome> {
        self.backup_all_at(files, OffsetDateTime::now_utc())
    }

    /// Back up every file, stamped with `at`.
    ///
    /// Failures are logged and reported per file; they never stop the rest.
    pub fn backup_all_at<P: AsRef<Path>>(&self, files: &[P], at: OffsetDateTime) -> Vec<BackupOutcome> {
        let stamp = at
            .to_offset(self.offset)
            .format(SUFFIX_FORMAT)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());

        if files.iter().all(|f| !f.as_ref().exists()) {
            warn!("Nothing to back up");
            return files
                .iter()
                .map(|f| BackupOutcome {
                    source: f.as_ref().to_path_buf(),
                    result: BackupResult::Missing,
                })
                .collect();
        }

        if let Err(e) = ensure_dir(&self.dir) {
            warn!("Backup directory unavailable: {}", e);
            return files
                .iter()
                .map(|f| BackupOutcome {
                    source: f.as_ref().to_path_buf(),
                    result: BackupResult::Failed(e.to_string()),
                })
                .collect();
        }

        files
            .iter()
            .map(|f| self.backup_one(f.as_ref(), &stamp))
            .collect()
    }

    fn backup_one(&self, source: &Path, stamp: &str) -> BackupOutcome {
        let result = if !source.exists() {
            warn!("Not backing up {}: file does not exist", source.display());
            BackupResult::Missing
        } else {
            let target = self.dir.join(backup_name(source, stamp));
            match fs::copy(source, &target) {
                Ok(_) => {
                    info!("Backed up {} to {}", source.display(), target.display());
                    BackupResult::Copied(target)
                }
                Err(e) => {
                    warn!("Failed to back up {}: {}", source.display(), e);
                    BackupResult::Failed(e.to_string())
                }
            }
        };

        BackupOutcome {
            source: source.to_path_buf(),
            result,
        }
    }
}

fn backup_name(source: &Path, stamp: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    match source.extension() {
        Some(ext) => format!("{}_bp_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_bp_{}", stem, stamp),
    }
}

/// Parse the stamp out of a backup file name produced by [`BackupManager`].
pub fn backup_timestamp(name: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let (_, rest) = name.rsplit_once("_bp_")?;
    let stamp = rest.get(..15)?;
    time::PrimitiveDateTime::parse(stamp, SUFFIX_FORMAT)
        .ok()
        .map(|dt| dt.assume_offset(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::{datetime, offset};

    #[test]
    fn test_backup_name() {
        assert_eq!(
            backup_name(Path::new("/data/measurements.json"), "20250515_162300"),
            "measurements_bp_20250515_162300.json"
        );
        assert_eq!(backup_name(Path::new("notes"), "x"), "notes_bp_x");
    }

    #[test]
    fn test_backup_all_copies_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("measurements.json");
        let missing = dir.path().join("td_data.json");
        fs::write(&present, "[]").unwrap();

        let manager = BackupManager::new(dir.path().join("backup"), offset!(+3));
        let at = datetime!(2025-05-15 13:23:00 UTC);
        let outcomes = manager.backup_all_at(&[&present, &missing], at);

        assert_eq!(outcomes.len(), 2);
        let expected = dir.path().join("backup").join("measurements_bp_20250515_162300.json");
        assert_eq!(outcomes[0].result, BackupResult::Copied(expected.clone()));
        assert_eq!(fs::read_to_string(expected).unwrap(), "[]");
        assert_eq!(outcomes[1].result, BackupResult::Missing);
    }

    #[test]
    fn test_nothing_to_back_up_leaves_no_directory() {
        let dir = TempDir::new().unwrap();
        let manager = BackupManager::new(dir.path().join("backup"), offset!(+3));
        let outcomes = manager.backup_all(&[dir.path().join("td_data.json")]);
        assert_eq!(outcomes[0].result, BackupResult::Missing);
        assert!(!manager.dir().exists());
    }

    #[test]
    fn test_backup_timestamp_round_trip() {
        let at = backup_timestamp("td_data_bp_20250515_162300.json", offset!(+3)).unwrap();
        assert_eq!(at, datetime!(2025-05-15 13:23:00 UTC));
        assert!(backup_timestamp("td_data.json", offset!(+3)).is_none());
    }
}

//! File-backed persistence for pulsefeed.
//!
//! All artifacts are plain pretty-printed JSON so downstream tools can read
//! them directly.
//!
//! # Features
//!
//! - [`HistoryStore`]: append-only log of every measurement
//! - [`SnapshotStore`]: latest measurement per device, replaced every cycle
//! - [`BackupManager`]: timestamped copies of the persisted files
//! - [`Registry`]: the device list
//!
//! Writes go through a temp file and a rename, so a reader polling the
//! snapshot never sees a half-written file.
//!
//! # Example
//!
//! ```no_run
//! use pulsefeed_store::{DataPaths, HistoryStore, Registry};
//!
//! let paths = DataPaths::default();
//! let registry = Registry::load(&paths.registry)?;
//! let history = HistoryStore::open(&paths.history)?;
//! println!("{} devices, {} records", registry.devices().len(), history.len());
//! # Ok::<(), pulsefeed_store::Error>(())
//! ```

mod backup;
mod error;
mod fs;
mod history;
mod registry;
mod snapshot;

use std::path::{Path, PathBuf};

pub use backup::{BackupManager, BackupOutcome, BackupResult, backup_timestamp};
pub use error::{Error, Result};
pub use history::{AppendOutcome, HistoryStore};
pub use registry::Registry;
pub use snapshot::{Snapshot, SnapshotStore};

/// Device registry file name.
pub const REGISTRY_FILE: &str = "bracelets.json";
/// History file name.
pub const HISTORY_FILE: &str = "measurements.json";
/// Snapshot file name.
pub const SNAPSHOT_FILE: &str = "td_data.json";
/// Backup directory name.
pub const BACKUP_DIR: &str = "backup";

/// Default data directory following platform conventions.
///
/// - Linux: `~/.local/share/pulsefeed`
/// - macOS: `~/Library/Application Support/pulsefeed`
/// - Windows: `C:\Users\<user>\AppData\Local\pulsefeed`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulsefeed")
}

/// Locations of every persisted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub registry: PathBuf,
    pub history: PathBuf,
    pub snapshot: PathBuf,
    pub backup_dir: PathBuf,
}

impl DataPaths {
    /// Standard file names under `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            registry: dir.join(REGISTRY_FILE),
            history: dir.join(HISTORY_FILE),
            snapshot: dir.join(SNAPSHOT_FILE),
            backup_dir: dir.join(BACKUP_DIR),
        }
    }

    /// Files covered by a backup, in backup order.
    pub fn backup_sources(&self) -> [&Path; 3] {
        [&self.registry, &self.history, &self.snapshot]
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir(default_data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_dir() {
        assert!(default_data_dir().ends_with("pulsefeed"));
    }

    #[test]
    fn test_paths_in_dir() {
        let paths = DataPaths::in_dir("/srv/pulse");
        assert_eq!(paths.history, PathBuf::from("/srv/pulse/measurements.json"));
        assert_eq!(paths.backup_dir, PathBuf::from("/srv/pulse/backup"));
        assert_eq!(paths.backup_sources()[0], Path::new("/srv/pulse/bracelets.json"));
    }
}

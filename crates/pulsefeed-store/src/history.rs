//! Append-only measurement history.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use pulsefeed_types::Measurement;

use crate::error::{Error, Result};
use crate::fs::{read_optional, write_json_atomic};

/// Result of [`HistoryStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The batch was added and the file rewritten.
    Persisted {
        /// Records added.
        added: usize,
        /// Records held after the append.
        total: usize,
    },
    /// The batch was empty; nothing was written.
    Skipped,
}

/// Every measurement collected so far, persisted as one JSON array.
///
/// Records are only ever appended. Each non-empty append rewrites the whole
/// file, so a failed write is repaired by the next successful one.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<Measurement>,
}

impl HistoryStore {
    /// Load the history at `path`.
    ///
    /// A missing or blank file yields an empty history. A file that is not a
    /// JSON array of measurements is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = match read_optional(&path)? {
            None => {
                info!("No history at {}, starting empty", path.display());
                Vec::new()
            }
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                path: path.clone(),
                source,
            })?,
        };

        info!("Loaded {} history record(s) from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in append order.
    pub fn records(&self) -> &[Measurement] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a batch and rewrite the file.
    ///
    /// The in-memory history grows even if the write fails.
    pub fn append(&mut self, batch: Vec<Measurement>) -> Result<AppendOutcome> {
        if batch.is_empty() {
            debug!("Empty batch, history not rewritten");
            return Ok(AppendOutcome::Skipped);
        }

        let added = batch.len();
        self.records.extend(batch);
        write_json_atomic(&self.path, &self.records)?;

        debug!(
            "Appended {} record(s), {} total in {}",
            added,
            self.records.len(),
            self.path.display()
        );
        Ok(AppendOutcome::Persisted {
            added,
            total: self.records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_types::{Device, DeviceId, Metrics};
    use tempfile::TempDir;

    fn measurement(ts: &str) -> Measurement {
        let device = Device::new(DeviceId::parse("CE:D6:AD:45:ED:75").unwrap(), "swaid 1330");
        let metrics = Metrics {
            hr: Some(70.0),
            ..Default::default()
        };
        Measurement::new(&device, ts, metrics)
    }

    #[test]
    fn test_open_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path().join("measurements.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_blank_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(HistoryStore::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_open_corrupt_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(HistoryStore::open(&path), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_append_grows_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.json");

        let mut store = HistoryStore::open(&path).unwrap();
        assert_eq!(
            store.append(vec![measurement("a"), measurement("b")]).unwrap(),
            AppendOutcome::Persisted { added: 2, total: 2 }
        );
        assert_eq!(
            store.append(vec![measurement("a")]).unwrap(),
            AppendOutcome::Persisted { added: 1, total: 3 }
        );

        // Duplicates are kept.
        let reopened = HistoryStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.records()[2].timestamp, "a");
    }

    #[test]
    fn test_empty_batch_skips_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.json");

        let mut store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.append(Vec::new()).unwrap(), AppendOutcome::Skipped);
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_still_advances_memory() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("measurements.json");
        let mut store = HistoryStore::open(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.append(vec![measurement("a")]).is_err());
        assert_eq!(store.len(), 1);

        std::fs::remove_dir(&path).unwrap();
        store.append(vec![measurement("b")]).unwrap();
        assert_eq!(HistoryStore::open(&path).unwrap().len(), 2);
    }
}

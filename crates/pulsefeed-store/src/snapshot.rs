//! Latest-value-per-device snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use pulsefeed_types::{DeviceId, Measurement};

use crate::error::{Error, Result};
use crate::fs::{read_optional, write_json_atomic};

/// Device id to latest measurement.
pub type Snapshot = BTreeMap<DeviceId, Measurement>;

/// Publishes the latest cycle's per-device values as a JSON object keyed by
/// device address.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Snapshot written to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the persisted snapshot with `latest`, even when it is empty.
    pub fn publish(&self, latest: &Snapshot) -> Result<()> {
        write_json_atomic(&self.path, latest)?;
        debug!(
            "Published snapshot of {} device(s) to {}",
            latest.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the persisted snapshot. A missing file reads as empty.
    pub fn load(&self) -> Result<Snapshot> {
        match read_optional(&self.path)? {
            None => Ok(Snapshot::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_types::{Device, Metrics};
    use tempfile::TempDir;

    #[test]
    fn test_publish_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("td_data.json"));

        let a = Device::new(DeviceId::parse("AA:BB:CC:DD:EE:01").unwrap(), "a");
        let b = Device::new(DeviceId::parse("AA:BB:CC:DD:EE:02").unwrap(), "b");
        let mut latest = Snapshot::new();
        latest.insert(a.id.clone(), Measurement::new(&a, "t1", Metrics::default()));
        latest.insert(b.id.clone(), Measurement::new(&b, "t1", Metrics::default()));
        store.publish(&latest).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);

        latest.remove(&b.id);
        store.publish(&latest).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&a.id].timestamp, "t1");
    }

    #[test]
    fn test_empty_snapshot_is_written() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("td_data.json"));
        store.publish(&Snapshot::new()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.trim(), "{}");
    }

    #[test]
    fn test_keys_are_device_addresses() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("td_data.json"));
        let a = Device::new(DeviceId::parse("ce-d6-ad-45-ed-75").unwrap(), "a");
        let mut latest = Snapshot::new();
        latest.insert(a.id.clone(), Measurement::new(&a, "t", Metrics::default()));
        store.publish(&latest).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["CE:D6:AD:45:ED:75"]["device_mac"], "CE:D6:AD:45:ED:75");
    }
}

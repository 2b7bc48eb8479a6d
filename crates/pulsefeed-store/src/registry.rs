//! Device registry loading.
//!
//! The registry is a JSON array of bracelet entries:
//!
//! ```json
//! [
//!   {"mac_address": "CE:D6:AD:45:ED:75", "name": "swaid 1330", "process": true},
//!   {"mac_address": "ce-d6-ad-45-ed-76", "name": "spare", "process": false}
//! ]
//! ```
//!
//! Addresses are normalized on load. Entries whose address is missing or
//! malformed are dropped quietly; entries with `process: false` are kept but
//! disabled.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use pulsefeed_types::{Device, DeviceId};

use crate::error::{Error, Result};
use crate::fs::read_optional;

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    mac_address: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    process: bool,
}

/// Devices loaded from a registry file.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    devices: Vec<Device>,
    skipped: usize,
}

impl Registry {
    /// Load the registry at `path`.
    ///
    /// Fails if the file is missing, unreadable, not a JSON array of entries
    /// or empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = read_optional(&path)?.ok_or_else(|| Error::NotFound(path.clone()))?;
        let entries: Vec<RegistryEntry> =
            serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                path: path.clone(),
                source,
            })?;
        if entries.is_empty() {
            return Err(Error::EmptyRegistry(path));
        }

        let mut devices = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for entry in entries {
            let Some(raw) = entry.mac_address.as_deref() else {
                debug!("Skipping registry entry without mac_address");
                skipped += 1;
                continue;
            };
            let id = match DeviceId::parse(raw) {
                Ok(id) => id,
                Err(e) => {
                    debug!("Skipping registry entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };
            let name = entry.name.unwrap_or_else(|| id.to_string());
            let mut device = Device::new(id, name);
            device.enabled = entry.process;
            devices.push(device);
        }

        let registry = Self {
            path,
            devices,
            skipped,
        };
        info!(
            "Loaded {} device(s) from {} ({} enabled)",
            registry.devices.len(),
            registry.path.display(),
            registry.enabled().count()
        );
        Ok(registry)
    }

    /// File the registry was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every valid entry, enabled or not.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Entries that take part in acquisition.
    pub fn enabled(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.enabled)
    }

    /// Entries dropped for a missing or malformed address.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

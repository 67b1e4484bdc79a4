//! Device registry entries

use serde::{Deserialize, Serialize};
use yoto_api::{DeviceId, DeviceRecord};

/// Whether a device can currently be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
    /// The event transport is down so reachability cannot be observed
    #[default]
    Unknown,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

/// A player known to this session
///
/// Devices are created from catalog refreshes and never removed; a device
/// missing from a later refresh is marked offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub model: String,
    pub connectivity: Connectivity,
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            model: model.into(),
            connectivity: Connectivity::Unknown,
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity == Connectivity::Online
    }
}

impl From<&DeviceRecord> for Device {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            model: record.model.clone(),
            connectivity: Connectivity::from_online(record.online),
        }
    }
}

//! Device registry
//!
//! Devices come from catalog refreshes and stay for the rest of the session.
//! Listing order is preserved so the first online device is well defined.

use parking_lot::RwLock;
use serde::Serialize;
use yoto_api::{DeviceId, DeviceRecord};
use yoto_state::{Connectivity, Device};

/// A device's reachability moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityChange {
    pub device_id: DeviceId,
    pub previous: Connectivity,
    pub current: Connectivity,
}

#[derive(Debug, Default)]
pub(crate) struct DeviceRegistry {
    devices: RwLock<Vec<Device>>,
}

impl DeviceRegistry {
    /// Merges a device listing
    ///
    /// New devices are added, listed ones updated, and unlisted ones marked
    /// offline. Returns every connectivity change.
    pub(crate) fn apply_listing(&self, records: &[DeviceRecord]) -> Vec<ConnectivityChange> {
        let mut devices = self.devices.write();
        let mut changes = Vec::new();

        for record in records {
            let incoming = Device::from(record);
            match devices.iter_mut().find(|d| d.id == record.id) {
                Some(existing) => {
                    existing.name = incoming.name;
                    existing.model = incoming.model;
                    if let Some(change) = update(existing, incoming.connectivity) {
                        changes.push(change);
                    }
                }
                None => {
                    changes.push(ConnectivityChange {
                        device_id: incoming.id.clone(),
                        previous: Connectivity::Unknown,
                        current: incoming.connectivity,
                    });
                    devices.push(incoming);
                }
            }
        }

        for device in devices.iter_mut() {
            if !records.iter().any(|r| r.id == device.id) {
                if let Some(change) = update(device, Connectivity::Offline) {
                    changes.push(change);
                }
            }
        }

        changes
    }

    pub(crate) fn set_connectivity(
        &self,
        device_id: &DeviceId,
        connectivity: Connectivity,
    ) -> Option<ConnectivityChange> {
        let mut devices = self.devices.write();
        let device = devices.iter_mut().find(|d| &d.id == device_id)?;
        update(device, connectivity)
    }

    pub(crate) fn set_all(&self, connectivity: Connectivity) -> Vec<ConnectivityChange> {
        self.devices
            .write()
            .iter_mut()
            .filter_map(|device| update(device, connectivity))
            .collect()
    }

    pub(crate) fn get(&self, device_id: &DeviceId) -> Option<Device> {
        self.devices.read().iter().find(|d| &d.id == device_id).cloned()
    }

    pub(crate) fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.read().iter().any(|d| &d.id == device_id)
    }

    pub(crate) fn all(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    pub(crate) fn ids(&self) -> Vec<DeviceId> {
        self.devices.read().iter().map(|d| d.id.clone()).collect()
    }

    /// First online device in listing order
    pub(crate) fn preferred(&self) -> Option<Device> {
        self.devices.read().iter().find(|d| d.is_online()).cloned()
    }
}

fn update(device: &mut Device, connectivity: Connectivity) -> Option<ConnectivityChange> {
    if device.connectivity == connectivity {
        return None;
    }
    let change = ConnectivityChange {
        device_id: device.id.clone(),
        previous: device.connectivity,
        current: connectivity,
    };
    device.connectivity = connectivity;
    Some(change)
}

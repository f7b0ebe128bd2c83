//! Device registry and announcement reconciliation
//!
//! One [`Device`] exists per identifier ever announced on the bus. A device
//! owns its current service list; the clients bound to it are tracked by
//! handle only.

use crate::client::ClientRegistry;
use crate::event::ClientHandle;
use crate::matcher;
use protocol::{DeviceIdentifier, GenerationWord, ServiceAnnouncement, ServiceClass, ServiceIndex};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Why a device's service list was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// First announcement from this device
    Discovered,
    /// Restart counter went backwards
    Restarted,
    /// Service count or classes differ
    ServicesChanged,
}

/// Outcome of reconciling an announcement against a known device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Same generation; only the generation word was updated
    Refreshed,
    /// Service list replaced and the device re-matched
    Rebuilt {
        reason: RebuildReason,
        disconnected: usize,
        attached: usize,
    },
}

/// A device known from its announcements
#[derive(Debug)]
pub struct Device {
    pub(crate) identifier: DeviceIdentifier,
    pub(crate) services: Option<ServiceAnnouncement>,
    pub(crate) last_seen: Instant,
    pub(crate) attached_clients: Vec<ClientHandle>,
}

impl Device {
    fn new(identifier: DeviceIdentifier, now: Instant) -> Self {
        Self {
            identifier,
            services: None,
            last_seen: now,
            attached_clients: Vec::new(),
        }
    }

    pub fn identifier(&self) -> DeviceIdentifier {
        self.identifier
    }

    /// Current service list; `None` only before the first announcement is applied
    pub fn services(&self) -> Option<&ServiceAnnouncement> {
        self.services.as_ref()
    }

    pub fn generation(&self) -> Option<GenerationWord> {
        self.services.as_ref().map(ServiceAnnouncement::generation)
    }

    pub fn service_class(&self, index: ServiceIndex) -> Option<ServiceClass> {
        self.services.as_ref()?.service_class(index)
    }

    /// Time of the most recent announcement
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Handles of clients bound to this device, in attachment order
    pub fn attached_clients(&self) -> &[ClientHandle] {
        &self.attached_clients
    }

    /// Classify `announcement` against the stored list
    ///
    /// `None` means the announcement belongs to the same generation.
    fn rebuild_reason(&self, announcement: &ServiceAnnouncement) -> Option<RebuildReason> {
        let Some(current) = &self.services else {
            return Some(RebuildReason::Discovered);
        };

        if current.len() != announcement.len() {
            return Some(RebuildReason::ServicesChanged);
        }
        if current.generation().indicates_restart(announcement.generation()) {
            return Some(RebuildReason::Restarted);
        }
        if !current.same_services(announcement) {
            return Some(RebuildReason::ServicesChanged);
        }
        None
    }

    /// Apply an announcement from this device
    ///
    /// A same-generation announcement only refreshes the generation word.
    /// Anything else disconnects every attached client, replaces the service
    /// list, and runs the matcher for this device.
    pub(crate) fn reconcile(
        &mut self,
        announcement: ServiceAnnouncement,
        clients: &mut ClientRegistry,
        now: Instant,
    ) -> Reconciliation {
        self.last_seen = now;

        let Some(reason) = self.rebuild_reason(&announcement) else {
            if let Some(current) = self.services.as_mut() {
                current.set_generation(announcement.generation());
            }
            return Reconciliation::Refreshed;
        };

        debug!(
            "Rebuilding device {} ({:?}): {} services, generation counter {}",
            self.identifier,
            reason,
            announcement.service_count(),
            announcement.generation().counter()
        );

        let attached = std::mem::take(&mut self.attached_clients);
        let disconnected = attached
            .into_iter()
            .filter(|handle| clients.disconnect(*handle))
            .count();

        self.services = Some(announcement);
        let attached = matcher::attach_clients(self, clients);

        Reconciliation::Rebuilt {
            reason,
            disconnected,
            attached,
        }
    }
}

/// Registry of known devices, in discovery order
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    index: HashMap<DeviceIdentifier, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, identifier: DeviceIdentifier) -> Option<&Device> {
        self.index.get(&identifier).map(|&pos| &self.devices[pos])
    }

    pub(crate) fn lookup_mut(&mut self, identifier: DeviceIdentifier) -> Option<&mut Device> {
        let pos = *self.index.get(&identifier)?;
        Some(&mut self.devices[pos])
    }

    /// Existing device, or a new one with an empty service list
    pub(crate) fn lookup_or_create(
        &mut self,
        identifier: DeviceIdentifier,
        now: Instant,
    ) -> &mut Device {
        let pos = match self.index.get(&identifier) {
            Some(&pos) => pos,
            None => {
                info!("Discovered device {}", identifier);
                self.devices.push(Device::new(identifier, now));
                let pos = self.devices.len() - 1;
                self.index.insert(identifier, pos);
                pos
            }
        };
        &mut self.devices[pos]
    }

    pub(crate) fn remove(&mut self, identifier: DeviceIdentifier) -> Option<Device> {
        let pos = self.index.remove(&identifier)?;
        let device = self.devices.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(device)
    }

    /// Devices in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

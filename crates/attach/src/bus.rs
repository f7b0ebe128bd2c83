//! Packet dispatcher
//!
//! [`Bus`] is the context object that owns both registries and the pending
//! sweep flag. The link layer hands it every received packet through
//! [`Bus::process_packet`]; each call runs to completion before the next.
//!
//! Per packet:
//!
//! ```text
//! received -> device resolved -> reconciled (announcements only)
//!          -> swept (if clients registered since last packet)
//!          -> broadcast to every client -> done
//! ```

use crate::client::{Client, ClientRegistry};
use crate::config::AttachConfig;
use crate::device::{Device, DeviceRegistry, Reconciliation};
use crate::event::{ClientHandle, ClientHandler, ClientInfo};
use crate::matcher;
use protocol::{DeviceIdentifier, Packet, ServiceAnnouncement, ServiceClass};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// What a single dispatch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Packet was a services announcement
    pub announcement: bool,
    /// Sender is (now) a known device
    pub device_known: bool,
    /// Result of applying the announcement, if any
    pub reconciliation: Option<Reconciliation>,
    /// Devices visited by the batched sweep (0 if no sweep ran)
    pub swept_devices: usize,
    /// Devices evicted for inactivity before dispatch
    pub evicted: Vec<DeviceIdentifier>,
}

/// Attachment context: device registry, client registry, and sweep state
#[derive(Debug, Default)]
pub struct Bus {
    config: AttachConfig,
    devices: DeviceRegistry,
    clients: ClientRegistry,
    reattach_pending: bool,
}

impl Bus {
    pub fn new(config: AttachConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &AttachConfig {
        &self.config
    }

    /// Register interest in a service class
    ///
    /// The client starts unattached. The next dispatched packet runs one
    /// sweep over all known devices, however many clients registered since.
    pub fn register_client<H>(&mut self, service_class: ServiceClass, handler: H) -> ClientHandle
    where
        H: ClientHandler + 'static,
    {
        let handle = self.clients.register(service_class, handler);
        self.reattach_pending = true;
        handle
    }

    /// Remove a client, disconnecting it first if attached
    pub fn unregister_client(&mut self, handle: ClientHandle) -> bool {
        let Some(binding) = self.clients.get(handle).map(Client::binding) else {
            return false;
        };

        if let Some(binding) = binding {
            if let Some(device) = self.devices.lookup_mut(binding.device) {
                device.attached_clients.retain(|attached| *attached != handle);
            }
            self.clients.disconnect(handle);
        }

        self.clients.remove(handle);
        debug!("Unregistered {}", handle);
        true
    }

    /// Dispatch one received packet
    pub fn process_packet(&mut self, packet: &Packet) -> protocol::Result<DispatchReport> {
        self.process_packet_at(packet, Instant::now())
    }

    /// Dispatch one received packet observed at `now`
    ///
    /// A malformed announcement is dropped before any state changes and
    /// reported as an error; no client sees it.
    pub fn process_packet_at(
        &mut self,
        packet: &Packet,
        now: Instant,
    ) -> protocol::Result<DispatchReport> {
        let announcement = if packet.is_announcement() {
            match ServiceAnnouncement::decode(&packet.data) {
                Ok(services) => Some(services),
                Err(e) => {
                    warn!(
                        "Dropping announcement from {}: {}",
                        packet.device_identifier, e
                    );
                    return Err(e);
                }
            }
        } else {
            None
        };

        let mut report = DispatchReport {
            announcement: announcement.is_some(),
            evicted: self.evict_stale_devices(now),
            ..DispatchReport::default()
        };

        match announcement {
            Some(services) => {
                let device = self.devices.lookup_or_create(packet.device_identifier, now);
                let outcome = device.reconcile(services, &mut self.clients, now);
                if let Reconciliation::Rebuilt {
                    reason,
                    disconnected,
                    attached,
                } = outcome
                {
                    debug!(
                        "Device {} rebuilt ({:?}): {} disconnected, {} attached",
                        packet.device_identifier, reason, disconnected, attached
                    );
                }
                report.device_known = true;
                report.reconciliation = Some(outcome);
            }
            None => {
                report.device_known = self.devices.lookup(packet.device_identifier).is_some();
            }
        }

        if self.reattach_pending {
            report.swept_devices = self.sweep();
        }

        self.clients.broadcast_any_packet(packet);

        if !report.device_known {
            trace!(
                "Packet from unknown device {} (service {}, command 0x{:04x})",
                packet.device_identifier, packet.service_number, packet.service_command
            );
        }

        Ok(report)
    }

    /// Match unattached clients against every known device
    fn sweep(&mut self) -> usize {
        self.reattach_pending = false;

        let mut visited = 0;
        let mut attached = 0;
        for device in self.devices.iter_mut() {
            attached += matcher::attach_clients(device, &mut self.clients);
            visited += 1;
        }

        debug!(
            "Reattach sweep visited {} devices, attached {} clients",
            visited, attached
        );
        visited
    }

    /// Drop devices silent for longer than the configured timeout
    ///
    /// No-op unless `stale_device_timeout` is set. Clients of evicted devices
    /// are disconnected and become eligible for the next sweep.
    pub fn evict_stale_devices(&mut self, now: Instant) -> Vec<DeviceIdentifier> {
        let Some(timeout) = self.config.stale_device_timeout else {
            return Vec::new();
        };

        let stale: Vec<DeviceIdentifier> = self
            .devices
            .iter()
            .filter(|device| now.saturating_duration_since(device.last_seen) > timeout)
            .map(Device::identifier)
            .collect();

        for identifier in &stale {
            let Some(device) = self.devices.remove(*identifier) else {
                continue;
            };
            info!(
                "Evicting device {} after {:?} without announcement",
                identifier,
                now.saturating_duration_since(device.last_seen)
            );
            for handle in device.attached_clients {
                self.clients.disconnect(handle);
            }
            self.reattach_pending = true;
        }

        stale
    }

    pub fn device(&self, identifier: DeviceIdentifier) -> Option<&Device> {
        self.devices.lookup(identifier)
    }

    /// Known devices in discovery order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn client(&self, handle: ClientHandle) -> Option<ClientInfo> {
        self.clients.get(handle).map(Client::info)
    }

    /// Registered clients in registration order
    pub fn clients(&self) -> impl Iterator<Item = ClientInfo> + '_ {
        self.clients.iter().map(Client::info)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Whether the next dispatch will run a full sweep
    pub fn reattach_pending(&self) -> bool {
        self.reattach_pending
    }
}

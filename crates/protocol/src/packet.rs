//! Bus packet as delivered by the link transport

use crate::announcement::ServiceAnnouncement;
use crate::types::{DeviceIdentifier, control};
use serde::{Deserialize, Serialize};

/// A single packet received from the bus
///
/// The transport has already validated framing and addressing; this layer
/// only inspects the header fields and, for announcements, the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Device that sent the packet
    pub device_identifier: DeviceIdentifier,
    /// Service number on the sending device (0 = control)
    pub service_number: u8,
    /// Service command code
    pub service_command: u16,
    /// Payload bytes
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(
        device_identifier: DeviceIdentifier,
        service_number: u8,
        service_command: u16,
        data: Vec<u8>,
    ) -> Self {
        Self {
            device_identifier,
            service_number,
            service_command,
            data,
        }
    }

    /// Build the services announcement a device would broadcast
    pub fn announcement(
        device_identifier: DeviceIdentifier,
        services: &ServiceAnnouncement,
    ) -> Self {
        Self::new(
            device_identifier,
            control::SERVICE_NUMBER,
            control::CMD_SERVICES,
            services.encode(),
        )
    }

    /// Whether this packet is a services announcement from the control service
    pub fn is_announcement(&self) -> bool {
        self.service_number == control::SERVICE_NUMBER
            && self.service_command == control::CMD_SERVICES
    }

    /// Payload length in bytes
    pub fn service_size(&self) -> usize {
        self.data.len()
    }
}

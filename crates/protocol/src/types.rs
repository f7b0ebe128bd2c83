//! Bus identifier and service type definitions
//!
//! This module defines the small value types that appear on the wire:
//! device identifiers, service classes and indices, the generation word
//! that leads every service announcement, and the control service
//! command codes.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique device identifier (assigned at manufacture)
///
/// Stable across reboots. The attachment layer never assigns these; it only
/// learns them from announcements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DeviceIdentifier(pub u64);

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Service class identifier
///
/// Names a capability a device can offer (a sensor type, an input device).
/// Class 0 belongs to the control service and is never matched to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceClass(pub u32);

impl ServiceClass {
    /// Control service, present at service number 0 on every device
    pub const CONTROL: ServiceClass = ServiceClass(0x0000_0000);
    pub const BUTTON: ServiceClass = ServiceClass(0x1473_a263);
    pub const HUMIDITY: ServiceClass = ServiceClass(0x16c8_10b8);
    pub const THERMOMETER: ServiceClass = ServiceClass(0x1421_bac7);
    pub const ARCADE_GAMEPAD: ServiceClass = ServiceClass(0x1dea_a06e);

    const WELL_KNOWN: [(&'static str, ServiceClass); 5] = [
        ("control", Self::CONTROL),
        ("button", Self::BUTTON),
        ("humidity", Self::HUMIDITY),
        ("thermometer", Self::THERMOMETER),
        ("arcade-gamepad", Self::ARCADE_GAMEPAD),
    ];

    /// Whether clients may bind to this class
    pub fn is_matchable(self) -> bool {
        self != Self::CONTROL
    }

    /// Human-readable name for well-known classes
    pub fn name(self) -> Option<&'static str> {
        Self::WELL_KNOWN
            .iter()
            .find(|(_, class)| *class == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08x})", name, self.0),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

impl FromStr for ServiceClass {
    type Err = ProtocolError;

    /// Parse a class from a well-known name, a `0x`-prefixed hex value, or decimal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((_, class)) = Self::WELL_KNOWN
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*class);
        }

        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        };

        parsed
            .map(ServiceClass)
            .map_err(|_| ProtocolError::InvalidServiceClass(s.to_string()))
    }
}

/// Position of a service within a device's announcement
///
/// Index 0 is the generation word slot, so valid service indices start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceIndex(pub u8);

impl fmt::Display for ServiceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First word of a service announcement
///
/// The low four bits carry the restart counter, which the device increments
/// with every announcement after boot and holds at its maximum. A counter
/// lower than the one previously seen means the device rebooted. The
/// remaining bits are device flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationWord(pub u32);

impl GenerationWord {
    pub const COUNTER_MASK: u32 = 0x0000_000f;
    pub const STATUS_LIGHT_MASK: u32 = 0x0000_0030;
    pub const SUPPORTS_ACK: u32 = 0x0000_0100;
    pub const SUPPORTS_BROADCAST: u32 = 0x0000_0200;
    pub const SUPPORTS_FRAMES: u32 = 0x0000_0400;
    pub const IS_CLIENT: u32 = 0x0000_0800;

    /// Generation word with the given counter and no flags
    pub fn new(counter: u8) -> Self {
        Self(u32::from(counter) & Self::COUNTER_MASK)
    }

    /// Same flags with a different counter
    pub fn with_counter(self, counter: u8) -> Self {
        Self((self.0 & !Self::COUNTER_MASK) | (u32::from(counter) & Self::COUNTER_MASK))
    }

    /// Same counter with additional flag bits set
    pub fn with_flags(self, flags: u32) -> Self {
        Self(self.0 | (flags & !Self::COUNTER_MASK))
    }

    /// Masked restart counter
    pub fn counter(self) -> u8 {
        (self.0 & Self::COUNTER_MASK) as u8
    }

    /// Device flag bits (counter masked out)
    pub fn flags(self) -> u32 {
        self.0 & !Self::COUNTER_MASK
    }

    /// Whether `newer` indicates the device restarted since `self` was seen
    pub fn indicates_restart(self, newer: GenerationWord) -> bool {
        newer.counter() < self.counter()
    }
}

/// Control service (service number 0) command codes
pub mod control {
    /// Service number of the control service on every device
    pub const SERVICE_NUMBER: u8 = 0;

    /// Services announcement: payload is the device's service list
    pub const CMD_SERVICES: u16 = 0x0000;
    /// No-op, used to poll a device
    pub const CMD_NOOP: u16 = 0x0080;
    /// Blink the status light
    pub const CMD_IDENTIFY: u16 = 0x0081;
    /// Reset the device
    pub const CMD_RESET: u16 = 0x0082;
}

//! Device discovery and client attachment for the broadcast bus
//!
//! Devices announce their identity and service list; clients declare the
//! service class they want. A [`Bus`] keeps both registries and, packet by
//! packet, binds every interested client to a device offering its class,
//! tearing bindings down when a device restarts or changes its services.
//!
//! # Example
//!
//! ```
//! use attach::{AttachDecision, Bus, ClientEvent, ClientInfo};
//! use protocol::{
//!     DeviceIdentifier, GenerationWord, Packet, ServiceAnnouncement, ServiceClass, ServiceIndex,
//! };
//!
//! let mut bus = Bus::default();
//! let client = bus.register_client(
//!     ServiceClass::THERMOMETER,
//!     |_: &ClientInfo, _: ClientEvent<'_>| AttachDecision::Accept,
//! );
//!
//! let services = ServiceAnnouncement::new(
//!     GenerationWord::new(1),
//!     &[ServiceClass::BUTTON, ServiceClass::THERMOMETER],
//! );
//! bus.process_packet(&Packet::announcement(DeviceIdentifier(0xAA), &services)).unwrap();
//!
//! let binding = bus.client(client).unwrap().binding.unwrap();
//! assert_eq!(binding.device, DeviceIdentifier(0xAA));
//! assert_eq!(binding.service_index, ServiceIndex(2));
//! ```

pub mod bus;
pub mod client;
pub mod config;
pub mod device;
pub mod event;
mod matcher;
pub mod test_utils;

pub use bus::{Bus, DispatchReport};
pub use client::{Client, ClientRegistry};
pub use config::AttachConfig;
pub use device::{Device, DeviceRegistry, RebuildReason, Reconciliation};
pub use event::{
    AttachDecision, Binding, ClientEvent, ClientHandle, ClientHandler, ClientInfo, EventKind,
};

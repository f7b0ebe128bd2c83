//! Protocol library for busattach
//!
//! This crate defines the wire-level vocabulary of the broadcast bus: device
//! identifiers, service classes, the generation word carried in announcements,
//! the `Packet` handed over by the link transport, and the service announcement
//! payload itself. It also provides a length-prefixed postcard codec used to
//! store and stream captured packets.
//!
//! # Example
//!
//! ```
//! use protocol::{DeviceIdentifier, GenerationWord, Packet, ServiceAnnouncement, ServiceClass};
//!
//! let announcement = ServiceAnnouncement::new(
//!     GenerationWord::new(1),
//!     &[ServiceClass::THERMOMETER, ServiceClass::ARCADE_GAMEPAD],
//! );
//! let packet = Packet::announcement(DeviceIdentifier(0xAA), &announcement);
//! assert!(packet.is_announcement());
//!
//! let decoded = ServiceAnnouncement::decode(&packet.data).unwrap();
//! assert_eq!(decoded.generation().counter(), 1);
//! assert_eq!(decoded.service_count(), 2);
//! ```
//!
//! # Framed Packets
//!
//! Captures and byte streams carry packets with a length prefix:
//!
//! ```
//! use protocol::{DeviceIdentifier, Packet, decode_framed, encode_framed};
//!
//! let packet = Packet::new(DeviceIdentifier(0xAA), 1, 0x1101, vec![0x20, 0x03]);
//! let framed = encode_framed(&packet).unwrap();
//! let decoded = decode_framed(&framed).unwrap();
//! assert_eq!(decoded, packet);
//! ```

pub mod announcement;
pub mod codec;
pub mod error;
pub mod packet;
pub mod types;

pub use announcement::{MAX_SERVICE_WORDS, ServiceAnnouncement};
pub use codec::{
    MAX_FRAME_SIZE, decode_framed, decode_packet, encode_framed, encode_packet, read_framed,
    write_framed,
};

#[cfg(feature = "async")]
pub use codec::{read_framed_async, write_framed_async};
pub use error::{ProtocolError, Result};
pub use packet::Packet;
pub use types::{DeviceIdentifier, GenerationWord, ServiceClass, ServiceIndex, control};

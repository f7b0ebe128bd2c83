//! Client notification vocabulary
//!
//! Every client owns a [`ClientHandler`] that receives lifecycle events and
//! a copy of every packet seen on the bus. The veto-capable
//! [`ClientEvent::AboutToConnect`] is the only event whose return value
//! matters.

use protocol::{DeviceIdentifier, Packet, ServiceClass, ServiceIndex};

/// Stable handle returned by client registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(pub u32);

impl std::fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// A client's binding to one service instance on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub device: DeviceIdentifier,
    pub service_index: ServiceIndex,
}

/// Snapshot of a client record, handed to its handler with every event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub handle: ClientHandle,
    pub service_class: ServiceClass,
    pub binding: Option<Binding>,
}

impl ClientInfo {
    pub fn is_attached(&self) -> bool {
        self.binding.is_some()
    }
}

/// Notification delivered to a client handler
#[derive(Debug, Clone, Copy)]
pub enum ClientEvent<'a> {
    /// The client is now bound to `ClientInfo::binding`
    Connect,
    /// The client's previous binding was torn down
    Disconnect,
    /// A binding is proposed; returning [`AttachDecision::Reject`] vetoes it
    AboutToConnect,
    /// A packet was dispatched on the bus (every client, every packet)
    AnyPacket(&'a Packet),
    /// A packet addressed to the bound service instance
    ///
    /// Never emitted by [`Bus`](crate::Bus); callers that route service
    /// traffic deliver it themselves using the client's binding.
    ServicePacket(&'a Packet),
}

/// Payload-free discriminant of [`ClientEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    AboutToConnect,
    AnyPacket,
    ServicePacket,
}

impl ClientEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connect => EventKind::Connect,
            ClientEvent::Disconnect => EventKind::Disconnect,
            ClientEvent::AboutToConnect => EventKind::AboutToConnect,
            ClientEvent::AnyPacket(_) => EventKind::AnyPacket,
            ClientEvent::ServicePacket(_) => EventKind::ServicePacket,
        }
    }

    /// Packet carried by the event, if any
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            ClientEvent::AnyPacket(packet) | ClientEvent::ServicePacket(packet) => Some(packet),
            _ => None,
        }
    }
}

/// Handler verdict; only consulted for [`ClientEvent::AboutToConnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachDecision {
    #[default]
    Accept,
    Reject,
}

/// Receiver of client notifications
///
/// Handlers run synchronously inside packet dispatch and only see a snapshot
/// of their own client, so they cannot re-enter the registries.
pub trait ClientHandler {
    fn on_event(&mut self, client: &ClientInfo, event: ClientEvent<'_>) -> AttachDecision;
}

impl<F> ClientHandler for F
where
    F: FnMut(&ClientInfo, ClientEvent<'_>) -> AttachDecision,
{
    fn on_event(&mut self, client: &ClientInfo, event: ClientEvent<'_>) -> AttachDecision {
        self(client, event)
    }
}

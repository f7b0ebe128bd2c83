//! Test utilities for driving a [`Bus`](crate::Bus)
//!
//! Provides packet builders and a recording handler shared by several
//! clients, so tests can assert on the exact event order across clients.
//!
//! # Example
//!
//! ```
//! use attach::Bus;
//! use attach::test_utils::{EventLog, announce};
//! use protocol::ServiceClass;
//!
//! let mut bus = Bus::default();
//! let log = EventLog::new();
//! let client = bus.register_client(ServiceClass::BUTTON, log.accepting());
//!
//! bus.process_packet(&announce(0xAA, 1, &[ServiceClass::BUTTON])).unwrap();
//! assert_eq!(log.connects(client), 1);
//! ```

use crate::event::{
    AttachDecision, Binding, ClientEvent, ClientHandle, ClientHandler, ClientInfo, EventKind,
};
use protocol::{DeviceIdentifier, GenerationWord, Packet, ServiceAnnouncement, ServiceClass};
use std::cell::RefCell;
use std::rc::Rc;

/// Services announcement from `device` with the given counter and classes
pub fn announce(device: u64, counter: u8, classes: &[ServiceClass]) -> Packet {
    let services = ServiceAnnouncement::new(GenerationWord::new(counter), classes);
    Packet::announcement(DeviceIdentifier(device), &services)
}

/// Ordinary (non-announcement) service traffic from `device`
pub fn service_packet(device: u64, service_number: u8) -> Packet {
    Packet::new(DeviceIdentifier(device), service_number, 0x1101, vec![0x00, 0x01])
}

/// One recorded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedEvent {
    pub client: ClientHandle,
    pub kind: EventKind,
    /// Client binding as seen by the handler
    pub binding: Option<Binding>,
}

/// Shared, ordered log of events across any number of clients
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<RecordedEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that records everything and accepts every attachment
    pub fn accepting(&self) -> impl ClientHandler + 'static {
        self.handler(AttachDecision::Accept)
    }

    /// Handler that records everything and vetoes every attachment
    pub fn rejecting(&self) -> impl ClientHandler + 'static {
        self.handler(AttachDecision::Reject)
    }

    fn handler(&self, decision: AttachDecision) -> impl ClientHandler + 'static {
        let events = Rc::clone(&self.events);
        move |client: &ClientInfo, event: ClientEvent<'_>| {
            events.borrow_mut().push(RecordedEvent {
                client: client.handle,
                kind: event.kind(),
                binding: client.binding,
            });
            decision
        }
    }

    /// All events so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }

    /// Lifecycle events only (`AnyPacket` filtered out)
    pub fn lifecycle(&self) -> Vec<RecordedEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.kind != EventKind::AnyPacket)
            .copied()
            .collect()
    }

    pub fn count(&self, client: ClientHandle, kind: EventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.client == client && event.kind == kind)
            .count()
    }

    pub fn connects(&self, client: ClientHandle) -> usize {
        self.count(client, EventKind::Connect)
    }

    pub fn disconnects(&self, client: ClientHandle) -> usize {
        self.count(client, EventKind::Disconnect)
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

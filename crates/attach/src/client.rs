//! Client registry
//!
//! Holds every registered client in registration order. Handles are handed
//! out from a monotonically increasing counter, so the backing vector stays
//! sorted by handle and lookups can binary search.

use crate::event::{
    AttachDecision, Binding, ClientEvent, ClientHandle, ClientHandler, ClientInfo,
};
use protocol::{Packet, ServiceClass};
use tracing::{debug, info};

/// A registered client
pub struct Client {
    pub(crate) handle: ClientHandle,
    pub(crate) service_class: ServiceClass,
    pub(crate) binding: Option<Binding>,
    handler: Box<dyn ClientHandler>,
}

impl Client {
    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    pub fn service_class(&self) -> ServiceClass {
        self.service_class
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            handle: self.handle,
            service_class: self.service_class,
            binding: self.binding,
        }
    }

    /// Deliver an event to this client's handler
    pub(crate) fn notify(&mut self, event: ClientEvent<'_>) -> AttachDecision {
        let info = self.info();
        self.handler.on_event(&info, event)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("handle", &self.handle)
            .field("service_class", &self.service_class)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Registry of clients in registration order
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Vec<Client>,
    next_handle: u32,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new, unattached client
    pub fn register<H>(&mut self, service_class: ServiceClass, handler: H) -> ClientHandle
    where
        H: ClientHandler + 'static,
    {
        let handle = ClientHandle(self.next_handle);
        self.next_handle += 1;

        self.clients.push(Client {
            handle,
            service_class,
            binding: None,
            handler: Box::new(handler),
        });

        debug!("Registered {} for service class {}", handle, service_class);
        handle
    }

    /// Drop a client record
    ///
    /// Does not touch the device side; the caller removes the back-reference.
    pub(crate) fn remove(&mut self, handle: ClientHandle) -> Option<Client> {
        let pos = self.position(handle)?;
        Some(self.clients.remove(pos))
    }

    pub fn get(&self, handle: ClientHandle) -> Option<&Client> {
        self.position(handle).map(|pos| &self.clients[pos])
    }

    pub(crate) fn get_mut(&mut self, handle: ClientHandle) -> Option<&mut Client> {
        self.position(handle).map(|pos| &mut self.clients[pos])
    }

    /// Clients in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clear a client's binding and notify it
    ///
    /// Returns false if the client is unknown or was not attached.
    pub(crate) fn disconnect(&mut self, handle: ClientHandle) -> bool {
        let Some(client) = self.get_mut(handle) else {
            return false;
        };
        let Some(binding) = client.binding.take() else {
            return false;
        };

        info!(
            "Disconnected {} from device {} service {}",
            handle, binding.device, binding.service_index
        );
        client.notify(ClientEvent::Disconnect);
        true
    }

    /// Hand the packet to every registered client, attached or not
    pub fn broadcast_any_packet(&mut self, packet: &Packet) {
        for client in &mut self.clients {
            client.notify(ClientEvent::AnyPacket(packet));
        }
    }

    fn position(&self, handle: ClientHandle) -> Option<usize> {
        self.clients
            .binary_search_by_key(&handle, |client| client.handle)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use protocol::{DeviceIdentifier, ServiceIndex};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(log: &Rc<RefCell<Vec<EventKind>>>) -> impl ClientHandler + 'static {
        let log = Rc::clone(log);
        move |_: &ClientInfo, event: ClientEvent<'_>| {
            log.borrow_mut().push(event.kind());
            AttachDecision::Accept
        }
    }

    #[test]
    fn test_handles_are_sequential() {
        let mut registry = ClientRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = registry.register(ServiceClass::BUTTON, recording(&log));
        let second = registry.register(ServiceClass::THERMOMETER, recording(&log));
        assert_eq!(first, ClientHandle(0));
        assert_eq!(second, ClientHandle(1));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(second).unwrap().binding().is_none());
    }

    #[test]
    fn test_lookup_after_remove() {
        let mut registry = ClientRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handles: Vec<_> = (0..4)
            .map(|_| registry.register(ServiceClass::BUTTON, recording(&log)))
            .collect();

        assert!(registry.remove(handles[1]).is_some());
        assert!(registry.get(handles[1]).is_none());
        assert_eq!(registry.get(handles[3]).unwrap().handle(), handles[3]);
        assert!(registry.remove(handles[1]).is_none());
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let mut registry = ClientRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.register(ServiceClass::BUTTON, recording(&log));
        registry.register(ServiceClass::CONTROL, recording(&log));

        let packet = Packet::new(DeviceIdentifier(9), 1, 0x1101, Vec::new());
        registry.broadcast_any_packet(&packet);

        assert_eq!(*log.borrow(), vec![EventKind::AnyPacket, EventKind::AnyPacket]);
    }

    #[test]
    fn test_disconnect_clears_binding_before_notifying() {
        let mut registry = ClientRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handle = registry.register(
            ServiceClass::BUTTON,
            move |client: &ClientInfo, event: ClientEvent<'_>| {
                sink.borrow_mut().push((event.kind(), client.binding));
                AttachDecision::Accept
            },
        );

        registry.get_mut(handle).unwrap().binding = Some(Binding {
            device: DeviceIdentifier(1),
            service_index: ServiceIndex(1),
        });

        assert!(registry.disconnect(handle));
        assert!(!registry.disconnect(handle));
        assert_eq!(*seen.borrow(), vec![(EventKind::Disconnect, None)]);
    }
}

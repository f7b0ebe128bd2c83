//! Attachment matcher
//!
//! Pairs unattached clients with service slots on one device. Clients are
//! visited in registration order so veto outcomes are reproducible.

use crate::client::ClientRegistry;
use crate::device::Device;
use crate::event::{AttachDecision, Binding, ClientEvent};
use tracing::{debug, info};

/// Offer `device`'s services to every unattached client
///
/// Each eligible client is bound to the first slot announcing its class. The
/// handler may veto the binding; a vetoing client stays unattached and is not
/// offered a later slot during this pass. Returns the number of clients that
/// attached.
pub(crate) fn attach_clients(device: &mut Device, clients: &mut ClientRegistry) -> usize {
    let mut attached = 0;

    for client in clients.iter_mut() {
        if client.binding.is_some() || !client.service_class.is_matchable() {
            continue;
        }

        let Some(service_index) = device
            .services
            .as_ref()
            .and_then(|services| services.find(client.service_class))
        else {
            continue;
        };

        client.binding = Some(Binding {
            device: device.identifier,
            service_index,
        });

        if client.notify(ClientEvent::AboutToConnect) == AttachDecision::Reject {
            debug!(
                "{} rejected device {} service {}",
                client.handle, device.identifier, service_index
            );
            client.binding = None;
            continue;
        }

        device.attached_clients.push(client.handle);
        info!(
            "Attached {} to device {} service {} ({})",
            client.handle, device.identifier, service_index, client.service_class
        );
        client.notify(ClientEvent::Connect);
        attached += 1;
    }

    attached
}

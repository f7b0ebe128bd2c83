//! Property-based tests for the attachment core
//!
//! Random interleavings of announcements, service traffic, and client
//! registrations must preserve the registry invariants.

use attach::test_utils::{EventLog, announce, service_packet};
use attach::{Bus, ClientHandle, EventKind};
use proptest::prelude::*;
use protocol::ServiceClass;
use std::collections::HashSet;

const CLASSES: [ServiceClass; 3] = [
    ServiceClass(0x1000_000a),
    ServiceClass(0x1000_000b),
    ServiceClass(0x1000_000c),
];

#[derive(Debug, Clone)]
enum Step {
    Announce {
        device: u64,
        counter: u8,
        classes: Vec<ServiceClass>,
    },
    Traffic {
        device: u64,
    },
    Register {
        class: ServiceClass,
        rejects: bool,
    },
}

/// Strategy for a class a device may announce or a client may want
fn class_strategy() -> impl Strategy<Value = ServiceClass> {
    prop::sample::select(CLASSES.to_vec())
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0u64..4, 0u8..16, prop::collection::vec(class_strategy(), 0..4)).prop_map(
            |(device, counter, classes)| Step::Announce {
                device,
                counter,
                classes,
            }
        ),
        2 => (0u64..6).prop_map(|device| Step::Traffic { device }),
        2 => (
            prop_oneof![4 => class_strategy(), 1 => Just(ServiceClass::CONTROL)],
            any::<bool>()
        )
            .prop_map(|(class, rejects)| Step::Register { class, rejects }),
    ]
}

fn apply(bus: &mut Bus, log: &EventLog, rejecting: &mut Vec<ClientHandle>, step: &Step) {
    match step {
        Step::Announce {
            device,
            counter,
            classes,
        } => {
            bus.process_packet(&announce(*device, *counter, classes)).unwrap();
        }
        Step::Traffic { device } => {
            bus.process_packet(&service_packet(*device, 1)).unwrap();
        }
        Step::Register { class, rejects } => {
            if *rejects {
                rejecting.push(bus.register_client(*class, log.rejecting()));
            } else {
                bus.register_client(*class, log.accepting());
            }
        }
    }
}

proptest! {
    /// Property: the device registry never holds duplicate identifiers
    #[test]
    fn prop_device_identifiers_unique(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let mut bus = Bus::default();
        let log = EventLog::new();
        let mut rejecting = Vec::new();

        for step in &steps {
            apply(&mut bus, &log, &mut rejecting, step);
            let ids: Vec<_> = bus.devices().map(|d| d.identifier()).collect();
            let unique: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(ids.len(), unique.len());
        }
    }

    /// Property: every client is held by at most one device, and only when bound to it
    #[test]
    fn prop_single_attachment(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let mut bus = Bus::default();
        let log = EventLog::new();
        let mut rejecting = Vec::new();

        for step in &steps {
            apply(&mut bus, &log, &mut rejecting, step);

            for client in bus.clients() {
                let holders: Vec<_> = bus
                    .devices()
                    .filter(|d| d.attached_clients().contains(&client.handle))
                    .collect();
                match client.binding {
                    Some(binding) => {
                        prop_assert_eq!(holders.len(), 1);
                        prop_assert_eq!(holders[0].identifier(), binding.device);
                        prop_assert_eq!(
                            holders[0].service_class(binding.service_index),
                            Some(client.service_class)
                        );
                    }
                    None => prop_assert!(holders.is_empty()),
                }
            }
        }
    }

    /// Property: a client that always vetoes never attaches
    #[test]
    fn prop_veto_is_permanent(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let mut bus = Bus::default();
        let log = EventLog::new();
        let mut rejecting = Vec::new();

        for step in &steps {
            apply(&mut bus, &log, &mut rejecting, step);
        }

        for handle in &rejecting {
            prop_assert!(bus.client(*handle).unwrap().binding.is_none());
            prop_assert_eq!(log.connects(*handle), 0);
            for device in bus.devices() {
                prop_assert!(!device.attached_clients().contains(handle));
            }
        }
    }

    /// Property: connects and disconnects alternate per client, starting with a connect
    #[test]
    fn prop_lifecycle_alternates(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let mut bus = Bus::default();
        let log = EventLog::new();
        let mut rejecting = Vec::new();

        for step in &steps {
            apply(&mut bus, &log, &mut rejecting, step);
        }

        for client in bus.clients() {
            let mut attached = false;
            for event in log.lifecycle().iter().filter(|e| e.client == client.handle) {
                match event.kind {
                    EventKind::Connect => {
                        prop_assert!(!attached);
                        attached = true;
                    }
                    EventKind::Disconnect => {
                        prop_assert!(attached);
                        attached = false;
                    }
                    _ => {}
                }
            }
            prop_assert_eq!(attached, client.binding.is_some());
        }
    }
}

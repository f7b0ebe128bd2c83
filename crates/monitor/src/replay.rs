//! Capture replay
//!
//! Feeds a stream of framed packets through a [`Bus`] with one client per
//! configured watch entry, logging every attachment change.

use crate::config::MonitorConfig;
use anyhow::{Context, Result};
use attach::{
    AttachDecision, Binding, Bus, ClientEvent, ClientHandle, ClientHandler, ClientInfo,
};
use protocol::{ProtocolError, read_framed_async};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::io::AsyncRead;
use tracing::{debug, info, trace, warn};

/// Per-watch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub connects: usize,
    pub disconnects: usize,
    pub rejected: usize,
    pub packets_seen: usize,
}

/// Outcome of a replay
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub packets: usize,
    pub announcements: usize,
    pub dropped: usize,
    pub devices: usize,
    pub watches: Vec<WatchSummary>,
}

#[derive(Debug, Clone)]
pub struct WatchSummary {
    pub name: String,
    pub binding: Option<Binding>,
    pub stats: WatchStats,
}

/// Client handler that logs one watch entry's events
struct WatchHandler {
    name: String,
    reject: bool,
    stats: Rc<RefCell<WatchStats>>,
}

impl ClientHandler for WatchHandler {
    fn on_event(&mut self, client: &ClientInfo, event: ClientEvent<'_>) -> AttachDecision {
        let mut stats = self.stats.borrow_mut();
        match event {
            ClientEvent::AboutToConnect if self.reject => {
                stats.rejected += 1;
                debug!("[{}] vetoing {:?}", self.name, client.binding);
                return AttachDecision::Reject;
            }
            ClientEvent::Connect => {
                stats.connects += 1;
                if let Some(binding) = client.binding {
                    info!(
                        "[{}] connected to device {} service {}",
                        self.name, binding.device, binding.service_index
                    );
                }
            }
            ClientEvent::Disconnect => {
                stats.disconnects += 1;
                info!("[{}] disconnected", self.name);
            }
            ClientEvent::AnyPacket(packet) => {
                stats.packets_seen += 1;
                trace!(
                    "[{}] packet from {} service {} command 0x{:04x}",
                    self.name,
                    packet.device_identifier,
                    packet.service_number,
                    packet.service_command
                );
            }
            _ => {}
        }
        AttachDecision::Accept
    }
}

/// A bus plus the watch clients registered from configuration
pub struct Monitor {
    bus: Bus,
    watches: Vec<(String, ClientHandle, Rc<RefCell<WatchStats>>)>,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let mut bus = Bus::new(config.attach.clone());
        let mut watches = Vec::with_capacity(config.watch.len());

        for entry in &config.watch {
            let class = entry.class()?;
            let stats = Rc::new(RefCell::new(WatchStats::default()));
            let handle = bus.register_client(
                class,
                WatchHandler {
                    name: entry.name.clone(),
                    reject: entry.reject,
                    stats: Rc::clone(&stats),
                },
            );
            info!("Watching {} as '{}' ({})", class, entry.name, handle);
            watches.push((entry.name.clone(), handle, stats));
        }

        Ok(Self { bus, watches })
    }

    /// Replay every framed packet from `reader` until end of stream
    pub async fn replay<R>(&mut self, reader: &mut R) -> Result<ReplaySummary>
    where
        R: AsyncRead + Unpin,
    {
        let mut summary = ReplaySummary::default();

        while let Some(packet) = read_framed_async(reader)
            .await
            .context("Failed to read capture frame")?
        {
            summary.packets += 1;
            match self.bus.process_packet(&packet) {
                Ok(report) => {
                    if report.announcement {
                        summary.announcements += 1;
                    }
                    for device in &report.evicted {
                        warn!("Device {} went silent and was evicted", device);
                    }
                }
                Err(
                    ProtocolError::MalformedAnnouncement { .. }
                    | ProtocolError::TooManyServices { .. },
                ) => {
                    summary.dropped += 1;
                }
                Err(e) => return Err(e).context("Failed to dispatch packet"),
            }
        }

        summary.devices = self.bus.device_count();
        summary.watches = self.watch_summaries();
        Ok(summary)
    }

    fn watch_summaries(&self) -> Vec<WatchSummary> {
        self.watches
            .iter()
            .map(|(name, handle, stats)| WatchSummary {
                name: name.clone(),
                binding: self.bus.client(*handle).and_then(|client| client.binding),
                stats: stats.borrow().clone(),
            })
            .collect()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchEntry;
    use crate::demo;
    use protocol::{DeviceIdentifier, Packet, ServiceIndex, control, write_framed};

    fn watch(name: &str, class: &str, reject: bool) -> WatchEntry {
        WatchEntry {
            name: name.to_string(),
            service_class: class.to_string(),
            reject,
        }
    }

    fn capture(packets: &[Packet]) -> Vec<u8> {
        let mut buffer = Vec::new();
        for packet in packets {
            write_framed(&mut buffer, packet).unwrap();
        }
        buffer
    }

    #[tokio::test]
    async fn test_replay_demo_capture() {
        let config = MonitorConfig::default();
        let mut monitor = Monitor::new(&config).unwrap();
        let bytes = capture(&demo::scenario());

        let summary = monitor.replay(&mut bytes.as_slice()).await.unwrap();

        assert_eq!(summary.packets, demo::scenario().len());
        assert_eq!(summary.dropped, 0);
        assert_eq!(summary.devices, 2);

        let thermometer = &summary.watches[0];
        assert_eq!(thermometer.name, "thermometer");
        assert_eq!(thermometer.stats.connects, 2);
        assert_eq!(thermometer.stats.disconnects, 1);
        assert_eq!(
            thermometer.binding,
            Some(Binding {
                device: DeviceIdentifier(demo::SENSOR_DEVICE),
                service_index: ServiceIndex(1),
            })
        );

        let gamepad = &summary.watches[1];
        assert_eq!(gamepad.stats.connects, 1);
        assert_eq!(gamepad.stats.packets_seen, summary.packets);
    }

    #[tokio::test]
    async fn test_rejecting_watch_never_binds() {
        let config = MonitorConfig {
            watch: vec![watch("picky", "thermometer", true)],
            ..MonitorConfig::default()
        };
        let mut monitor = Monitor::new(&config).unwrap();
        let bytes = capture(&demo::scenario());

        let summary = monitor.replay(&mut bytes.as_slice()).await.unwrap();

        let picky = &summary.watches[0];
        assert_eq!(picky.binding, None);
        assert_eq!(picky.stats.connects, 0);
        assert!(picky.stats.rejected > 0);
    }

    #[tokio::test]
    async fn test_malformed_announcement_is_counted_and_skipped() {
        let config = MonitorConfig::default();
        let mut monitor = Monitor::new(&config).unwrap();
        let bad = Packet::new(
            DeviceIdentifier(0x42),
            control::SERVICE_NUMBER,
            control::CMD_SERVICES,
            vec![0x01, 0x02],
        );
        let mut packets = vec![bad];
        packets.extend(demo::scenario());
        let bytes = capture(&packets);

        let summary = monitor.replay(&mut bytes.as_slice()).await.unwrap();

        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.packets, packets.len());
        assert!(monitor.bus().device(DeviceIdentifier(0x42)).is_none());
    }

    #[tokio::test]
    async fn test_truncated_capture_is_error() {
        let mut monitor = Monitor::new(&MonitorConfig::default()).unwrap();
        let mut bytes = capture(&demo::scenario());
        bytes.truncate(bytes.len() - 2);

        assert!(monitor.replay(&mut bytes.as_slice()).await.is_err());
    }

    #[tokio::test]
    async fn test_capture_ending_inside_length_prefix_is_error() {
        let mut monitor = Monitor::new(&MonitorConfig::default()).unwrap();
        let mut bytes = capture(&demo::scenario());
        bytes.extend_from_slice(&[0, 0, 0]);

        assert!(monitor.replay(&mut bytes.as_slice()).await.is_err());
    }
}

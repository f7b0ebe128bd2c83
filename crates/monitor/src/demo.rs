//! Synthetic capture of a small bus session
//!
//! A sensor board comes up, a gamepad joins, then the sensor reboots with a
//! reduced service list before restoring its full set.

use anyhow::{Context, Result};
use protocol::{
    DeviceIdentifier, GenerationWord, Packet, ServiceAnnouncement, ServiceClass, write_framed,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const SENSOR_DEVICE: u64 = 0x0000_00aa_5e45_0001;
pub const GAMEPAD_DEVICE: u64 = 0x0000_00bb_6a3e_0002;

fn announce(device: u64, counter: u8, classes: &[ServiceClass]) -> Packet {
    let services = ServiceAnnouncement::new(GenerationWord::new(counter), classes);
    Packet::announcement(DeviceIdentifier(device), &services)
}

fn reading(device: u64, service_number: u8, value: u16) -> Packet {
    // Register-get response for the service's reading register
    Packet::new(
        DeviceIdentifier(device),
        service_number,
        0x1101,
        value.to_le_bytes().to_vec(),
    )
}

/// Packets of the demo session in bus order
pub fn scenario() -> Vec<Packet> {
    let full = [ServiceClass::THERMOMETER, ServiceClass::BUTTON];

    vec![
        announce(SENSOR_DEVICE, 1, &full),
        reading(SENSOR_DEVICE, 1, 2150),
        announce(SENSOR_DEVICE, 2, &full),
        announce(GAMEPAD_DEVICE, 1, &[ServiceClass::ARCADE_GAMEPAD]),
        reading(GAMEPAD_DEVICE, 1, 0x0004),
        reading(SENSOR_DEVICE, 1, 2162),
        // reboot: counter drops and only the button is up yet
        announce(SENSOR_DEVICE, 1, &[ServiceClass::BUTTON]),
        reading(SENSOR_DEVICE, 1, 0),
        announce(SENSOR_DEVICE, 2, &full),
        reading(SENSOR_DEVICE, 1, 2171),
        announce(GAMEPAD_DEVICE, 2, &[ServiceClass::ARCADE_GAMEPAD]),
    ]
}

/// Write the demo session as a framed capture file
pub fn write_demo(path: &Path) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create capture file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let packets = scenario();
    for packet in &packets {
        write_framed(&mut writer, packet).context("Failed to write capture frame")?;
    }
    writer.flush().context("Failed to flush capture file")?;

    info!("Wrote {} packets to {}", packets.len(), path.display());
    Ok(packets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::read_framed;
    use std::io::BufReader;

    #[test]
    fn test_scenario_contains_reboot() {
        let packets = scenario();
        let counters: Vec<u8> = packets
            .iter()
            .filter(|p| p.is_announcement())
            .filter(|p| p.device_identifier == DeviceIdentifier(SENSOR_DEVICE))
            .map(|p| {
                ServiceAnnouncement::decode(&p.data)
                    .unwrap()
                    .generation()
                    .counter()
            })
            .collect();
        assert_eq!(counters, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_write_demo_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.cap");

        let written = write_demo(&path).unwrap();

        let mut reader = BufReader::new(File::open(&path).unwrap());
        let mut read = Vec::new();
        while let Some(packet) = read_framed(&mut reader).unwrap() {
            read.push(packet);
        }
        assert_eq!(read.len(), written);
        assert_eq!(read, scenario());
    }
}

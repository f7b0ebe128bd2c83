//! Packet serialization and deserialization using postcard
//!
//! Captured bus traffic is stored and streamed as length-prefixed frames so
//! packets can be replayed through the attachment layer.
//!
//! # Frame Format
//!
//! ```text
//! [Length: u32 (big-endian)][Packet bytes (postcard serialized)]
//! ```
//!
//! Bus packets are small, so frames are capped at 64 KiB.

use crate::{Packet, error::ProtocolError, error::Result};
use std::io::{self, Read, Write};

#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum allowed frame size (64 KiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a packet to bytes using postcard
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    postcard::to_allocvec(packet).map_err(ProtocolError::from)
}

/// Decode a packet from bytes using postcard
pub fn decode_packet(bytes: &[u8]) -> Result<Packet> {
    postcard::from_bytes(bytes).map_err(ProtocolError::from)
}

/// Encode a packet with length prefix for framing
///
/// Frame format: [4-byte length (big-endian)][postcard packet bytes]
pub fn encode_framed(packet: &Packet) -> Result<Vec<u8>> {
    let packet_bytes = encode_packet(packet)?;
    let packet_len = packet_bytes.len();

    if packet_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: packet_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(4 + packet_len);
    frame.extend_from_slice(&(packet_len as u32).to_be_bytes());
    frame.extend_from_slice(&packet_bytes);

    Ok(frame)
}

/// Decode a framed packet
///
/// Expects frame format: [4-byte length (big-endian)][postcard packet bytes]
pub fn decode_framed(frame: &[u8]) -> Result<Packet> {
    if frame.len() < 4 {
        return Err(ProtocolError::IncompleteFrame {
            expected: 4,
            actual: frame.len(),
        });
    }

    let length = frame_length([frame[0], frame[1], frame[2], frame[3]])?;

    if frame.len() < 4 + length {
        return Err(ProtocolError::IncompleteFrame {
            expected: 4 + length,
            actual: frame.len(),
        });
    }

    decode_packet(&frame[4..4 + length])
}

/// Write a framed packet to a writer (e.g., a capture file)
pub fn write_framed<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    let framed = encode_framed(packet)?;
    writer.write_all(&framed)?;
    Ok(())
}

/// Read the next framed packet from a reader
///
/// Returns `Ok(None)` when the reader is exhausted at a frame boundary; a
/// stream that ends inside a frame is an error.
pub fn read_framed<R: Read>(reader: &mut R) -> Result<Option<Packet>> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        match reader.read(&mut len_bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let Some(len_bytes) = length_prefix(len_bytes, filled)? else {
        return Ok(None);
    };
    let length = frame_length(len_bytes)?;

    let mut packet_bytes = vec![0u8; length];
    reader.read_exact(&mut packet_bytes)?;

    decode_packet(&packet_bytes).map(Some)
}

/// Async: Write a framed packet to an async writer
#[cfg(feature = "async")]
pub async fn write_framed_async<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let framed = encode_framed(packet)?;
    writer.write_all(&framed).await?;
    Ok(())
}

/// Async: Read the next framed packet from an async reader
///
/// Same end-of-stream semantics as [`read_framed`].
#[cfg(feature = "async")]
pub async fn read_framed_async<R>(reader: &mut R) -> Result<Option<Packet>>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        match reader.read(&mut len_bytes[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let Some(len_bytes) = length_prefix(len_bytes, filled)? else {
        return Ok(None);
    };
    let length = frame_length(len_bytes)?;

    let mut packet_bytes = vec![0u8; length];
    reader.read_exact(&mut packet_bytes).await?;

    decode_packet(&packet_bytes).map(Some)
}

/// No bytes at all is a clean end of stream; a partial prefix is not
fn length_prefix(len_bytes: [u8; 4], filled: usize) -> Result<Option<[u8; 4]>> {
    match filled {
        0 => Ok(None),
        4 => Ok(Some(len_bytes)),
        actual => Err(ProtocolError::IncompleteFrame {
            expected: 4,
            actual,
        }),
    }
}

fn frame_length(len_bytes: [u8; 4]) -> Result<usize> {
    let length = u32::from_be_bytes(len_bytes) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceIdentifier, GenerationWord, ServiceAnnouncement, ServiceClass};
    use std::io::Cursor;

    fn sample_announcement() -> Packet {
        let services = ServiceAnnouncement::new(
            GenerationWord::new(3),
            &[ServiceClass::THERMOMETER, ServiceClass::HUMIDITY],
        );
        Packet::announcement(DeviceIdentifier(0x1122_3344_5566_7788), &services)
    }

    #[test]
    fn test_packet_roundtrip() {
        let packet = sample_announcement();
        let bytes = encode_packet(&packet).unwrap();
        let decoded = decode_packet(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert!(decoded.is_announcement());
    }

    #[test]
    fn test_framed_incomplete_frame() {
        let incomplete = vec![0, 0, 0, 10];
        let result = decode_framed(&incomplete);
        let Err(ProtocolError::IncompleteFrame { expected, actual }) = result else {
            panic!("Expected IncompleteFrame error, got {:?}", result);
        };
        assert_eq!(expected, 14);
        assert_eq!(actual, 4);
    }

    #[test]
    fn test_framed_too_large() {
        let too_large = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result = decode_framed(&too_large);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_partial_length_prefix() {
        let result = decode_framed(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteFrame {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_read_framed_sequence_until_eof() {
        let first = sample_announcement();
        let second = Packet::new(DeviceIdentifier(7), 1, 0x1101, vec![0xde, 0xad]);

        let mut buffer = Vec::new();
        write_framed(&mut buffer, &first).unwrap();
        write_framed(&mut buffer, &second).unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_framed(&mut cursor).unwrap(), Some(first));
        assert_eq!(read_framed(&mut cursor).unwrap(), Some(second));
        assert_eq!(read_framed(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_read_framed_truncated_body_is_error() {
        let mut buffer = encode_framed(&sample_announcement()).unwrap();
        buffer.truncate(buffer.len() - 1);

        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            read_framed(&mut cursor),
            Err(ProtocolError::Io(_))
        ));
    }

    #[test]
    fn test_read_framed_truncated_prefix_is_error() {
        let mut buffer = Vec::new();
        write_framed(&mut buffer, &sample_announcement()).unwrap();
        buffer.extend_from_slice(&[0, 0]);

        let mut cursor = Cursor::new(buffer);
        assert!(read_framed(&mut cursor).unwrap().is_some());
        assert!(matches!(
            read_framed(&mut cursor),
            Err(ProtocolError::IncompleteFrame {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_truncated_prefix_is_error() {
        let mut buffer = Vec::new();
        write_framed_async(&mut buffer, &sample_announcement())
            .await
            .unwrap();
        buffer.push(0);

        let mut reader = buffer.as_slice();
        assert!(read_framed_async(&mut reader).await.unwrap().is_some());
        assert!(matches!(
            read_framed_async(&mut reader).await,
            Err(ProtocolError::IncompleteFrame {
                expected: 4,
                actual: 1
            })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_write_read_framed() {
        let packet = sample_announcement();

        let mut buffer = Vec::new();
        write_framed_async(&mut buffer, &packet).await.unwrap();

        let mut reader = buffer.as_slice();
        assert_eq!(read_framed_async(&mut reader).await.unwrap(), Some(packet));
        assert_eq!(read_framed_async(&mut reader).await.unwrap(), None);
    }
}

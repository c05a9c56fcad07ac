//! ACIP wire frame: a 26-byte header followed by `length` payload bytes.
//!
//! ```text
//! [0..8]   magic:     u64 big-endian, ACIP_MAGIC
//! [8..10]  type:      u16 big-endian, packet type
//! [10..14] length:    u32 big-endian, payload byte count
//! [14..18] crc32:     u32 big-endian, CRC32(payload), 0 when length == 0
//! [18..26] client_id: u64 big-endian, opaque per-connection sender tag
//! [26..]   payload (length bytes)
//! ```
//!
//! This module frames/deframes bytes already fully buffered in memory.
//! `acip_server::codec` drives this against a live socket with partial reads.

use crate::constants::{ACIP_MAGIC, MAX_PAYLOAD_SIZE};
use crate::error::FrameError;

pub const HEADER_SIZE: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_type: u16,
    pub length: u32,
    pub crc32: u32,
    pub client_id: u64,
}

impl FrameHeader {
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Result<Self, FrameError> {
        let magic = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        if magic != ACIP_MAGIC {
            return Err(FrameError::BadMagic {
                expected: ACIP_MAGIC,
                actual: magic,
            });
        }
        let packet_type = u16::from_be_bytes(buf[8..10].try_into().unwrap());
        let length = u32::from_be_bytes(buf[10..14].try_into().unwrap());
        let crc32 = u32::from_be_bytes(buf[14..18].try_into().unwrap());
        let client_id = u64::from_be_bytes(buf[18..26].try_into().unwrap());

        if length > MAX_PAYLOAD_SIZE {
            return Err(FrameError::Oversize(length, MAX_PAYLOAD_SIZE));
        }

        Ok(Self {
            packet_type,
            length,
            crc32,
            client_id,
        })
    }

    pub fn write(&self, out: &mut [u8; HEADER_SIZE]) {
        out[0..8].copy_from_slice(&ACIP_MAGIC.to_be_bytes());
        out[8..10].copy_from_slice(&self.packet_type.to_be_bytes());
        out[10..14].copy_from_slice(&self.length.to_be_bytes());
        out[14..18].copy_from_slice(&self.crc32.to_be_bytes());
        out[18..26].copy_from_slice(&self.client_id.to_be_bytes());
    }
}

pub fn crc32(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        0
    } else {
        crc32fast::hash(payload)
    }
}

/// Encode a complete frame (header + payload) into one owned buffer.
pub fn encode(packet_type: u16, client_id: u64, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        packet_type,
        length: payload.len() as u32,
        crc32: crc32(payload),
        client_id,
    };
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    let mut header_bytes = [0u8; HEADER_SIZE];
    header.write(&mut header_bytes);
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(payload);
    buf
}

/// Decode a single frame from a buffer that already holds it in full.
/// Returns the parsed header, the owned payload, and the number of bytes
/// consumed from `buf`.
pub fn decode(buf: &[u8]) -> Result<(FrameHeader, Vec<u8>, usize), FrameError> {
    if buf.is_empty() {
        return Err(FrameError::CleanEof);
    }
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let header_bytes: [u8; HEADER_SIZE] = buf[..HEADER_SIZE].try_into().unwrap();
    let header = FrameHeader::parse(&header_bytes)?;

    let len = header.length as usize;
    if buf.len() < HEADER_SIZE + len {
        return Err(FrameError::Truncated);
    }
    let payload = buf[HEADER_SIZE..HEADER_SIZE + len].to_vec();
    let actual_crc = crc32(&payload);
    if actual_crc != header.crc32 {
        return Err(FrameError::CorruptCrc {
            expected: header.crc32,
            actual: actual_crc,
        });
    }

    Ok((header, payload, HEADER_SIZE + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_nonempty_payload() {
        let payload = b"hello acip".to_vec();
        let buf = encode(0x0001, 42, &payload);
        let (header, decoded, consumed) = decode(&buf).unwrap();
        assert_eq!(header.packet_type, 0x0001);
        assert_eq!(header.client_id, 42);
        assert_eq!(decoded, payload);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn zero_length_payload_has_zero_crc() {
        let buf = encode(0x0007, 1, &[]);
        let (header, decoded, _) = decode(&buf).unwrap();
        assert_eq!(header.crc32, 0);
        assert!(decoded.is_empty());
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        assert!(matches!(decode(&[]), Err(FrameError::CleanEof)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = encode(0x0001, 1, b"x");
        buf[0] ^= 0xFF;
        assert!(matches!(decode(&buf), Err(FrameError::BadMagic { .. })));
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut buf = encode(0x0001, 1, b"hello");
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(decode(&buf), Err(FrameError::CorruptCrc { .. })));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let buf = encode(0x0001, 1, b"hello");
        assert!(matches!(decode(&buf[..10]), Err(FrameError::Truncated)));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let buf = encode(0x0001, 1, b"hello world");
        assert!(matches!(
            decode(&buf[..HEADER_SIZE + 3]),
            Err(FrameError::Truncated)
        ));
    }

    #[test]
    fn oversize_length_is_rejected() {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let header = FrameHeader {
            packet_type: 1,
            length: MAX_PAYLOAD_SIZE + 1,
            crc32: 0,
            client_id: 0,
        };
        header.write(&mut header_bytes);
        assert!(matches!(
            FrameHeader::parse(&header_bytes),
            Err(FrameError::Oversize(_, _))
        ));
    }

    #[test]
    fn unknown_type_is_not_a_codec_error() {
        // The codec itself never rejects an unknown type — that is dispatch's job.
        let buf = encode(0xBEEF, 1, b"payload");
        let (header, _, _) = decode(&buf).unwrap();
        assert_eq!(header.packet_type, 0xBEEF);
    }

    proptest::proptest! {
        #[test]
        fn roundtrip_holds_for_any_well_formed_frame(
            packet_type: u16,
            client_id: u64,
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4096),
        ) {
            let buf = encode(packet_type, client_id, &payload);
            let (header, decoded, consumed) = decode(&buf).unwrap();
            proptest::prop_assert_eq!(header.packet_type, packet_type);
            proptest::prop_assert_eq!(header.client_id, client_id);
            proptest::prop_assert_eq!(&decoded, &payload);
            proptest::prop_assert_eq!(consumed, buf.len());
        }

        #[test]
        fn a_single_corrupted_payload_byte_is_always_caught(
            payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..4096),
            flip_index in 0usize..4096,
        ) {
            let buf = encode(0x0001, 1, &payload);
            let mut corrupted = buf.clone();
            let idx = HEADER_SIZE + (flip_index % payload.len());
            corrupted[idx] ^= 0xFF;
            proptest::prop_assert!(matches!(decode(&corrupted), Err(FrameError::CorruptCrc { .. })));
        }
    }
}

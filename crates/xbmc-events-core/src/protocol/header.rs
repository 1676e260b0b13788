//! The fixed 32-byte header carried by every datagram.
//!
//! Wire format:
//! ```text
//! [sig:4 "XBMC"][major:1][minor:1][type:2][seq:4][total:4][payload_len:2][reserved:14]
//! ```
//! All multi-byte integers are big-endian.  `seq` is 1-based and
//! `1 <= seq <= total`.  Fragments after the first of a multi-fragment
//! message declare type BLOB whatever the logical type is.

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{
    PacketType, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_MAJOR, PROTOCOL_MINOR, SIGNATURE,
};

/// Decoded form of the 32-byte datagram header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    /// Declared type: the real type for fragment 1, BLOB for continuations.
    pub packet_type: PacketType,
    /// 1-based index of this fragment.
    pub sequence: u32,
    /// Number of fragments in the logical message.
    pub total: u32,
    /// Length of the payload following this header.
    pub payload_len: u16,
}

impl WireHeader {
    /// Builds the header for fragment `sequence` of `total`.
    ///
    /// The caller guarantees `payload_len <= MAX_PAYLOAD_SIZE`.
    pub fn new(packet_type: PacketType, total: u32, sequence: u32, payload_len: u16) -> Self {
        Self {
            packet_type,
            sequence,
            total,
            payload_len,
        }
    }

    /// Serialises the header into its fixed 32-byte form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&SIGNATURE);
        buf[4] = PROTOCOL_MAJOR;
        buf[5] = PROTOCOL_MINOR;
        buf[6..8].copy_from_slice(&(self.packet_type as u16).to_be_bytes());
        buf[8..12].copy_from_slice(&self.sequence.to_be_bytes());
        buf[12..16].copy_from_slice(&self.total.to_be_bytes());
        buf[16..18].copy_from_slice(&self.payload_len.to_be_bytes());
        // bytes 18..32 stay zero (reserved)
        buf
    }

    /// Parses a header from the first 32 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the buffer is short, the signature or
    /// major version is wrong, the type code is unknown, or the fragment
    /// counters are inconsistent.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }
        if bytes[0..4] != SIGNATURE {
            return Err(ProtocolError::BadSignature([bytes[0], bytes[1], bytes[2], bytes[3]]));
        }
        if bytes[4] != PROTOCOL_MAJOR {
            return Err(ProtocolError::UnsupportedVersion {
                major: bytes[4],
                minor: bytes[5],
            });
        }

        let type_code = u16::from_be_bytes([bytes[6], bytes[7]]);
        let packet_type =
            PacketType::try_from(type_code).map_err(|_| ProtocolError::UnknownPacketType(type_code))?;
        let sequence = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let total = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let payload_len = u16::from_be_bytes([bytes[16], bytes[17]]);

        if total == 0 || sequence == 0 || sequence > total {
            return Err(ProtocolError::InvalidSequence { sequence, total });
        }
        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::MalformedPayload(format!(
                "fragment payload of {payload_len} bytes exceeds {MAX_PAYLOAD_SIZE}"
            )));
        }

        Ok(Self {
            packet_type,
            sequence,
            total,
            payload_len,
        })
    }
}

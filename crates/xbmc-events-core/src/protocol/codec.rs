//! Binary codec for EventServer messages.
//!
//! Encoding happens in two steps:
//!
//! 1. The logical payload of a [`Message`] is serialised into one byte vector.
//! 2. That vector is cut into `len / 992 + 1` fragments.  Each fragment gets
//!    its own 32-byte [`WireHeader`] and becomes one UDP datagram.
//!
//! Note the `+ 1`: a payload whose length is an exact multiple of 992 ends
//! with an empty fragment, and an empty payload still produces one datagram.
//!
//! Decoding works on single datagrams.  Reassembling fragments of
//! different messages is left to the receiver; this crate provides
//! [`decode_payload`] for callers that have already concatenated the
//! fragments of one message.

use crate::protocol::header::WireHeader;
use crate::protocol::messages::{
    ActionMessage, ActionType, ButtonFlags, ButtonMessage, HeloMessage, IconType, LogLevel,
    LogMessage, Message, MouseFlags, MouseMessage, NotificationMessage, PacketType, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
use thiserror::Error;
use tracing::trace;

/// Bytes between the HELO icon type and the icon data: port (2) + reserved (1+8).
const HELO_PADDING: usize = 10;

/// Reserved bytes between the NOTIFICATION icon type and the icon data.
const NOTIFICATION_RESERVED: usize = 4;

/// Errors that can occur while decoding datagrams or payloads.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The first four bytes are not `"XBMC"`.
    #[error("bad signature: {0:02X?}")]
    BadSignature([u8; 4]),

    /// The protocol major version in the header is not supported.
    #[error("unsupported protocol version: {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The packet type code in the header is not a recognised value.
    #[error("unknown packet type: 0x{0:04X}")]
    UnknownPacketType(u16),

    /// The fragment counters violate `1 <= sequence <= total`.
    #[error("invalid fragment counters: {sequence} of {total}")]
    InvalidSequence { sequence: u32, total: u32 },

    /// A typed decode was requested for one fragment of a larger message.
    #[error("datagram is one fragment of a {total}-fragment message")]
    Fragmented { total: u32 },

    /// The payload could not be parsed (missing terminator, bad enum value, UTF-8 error...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload length field does not match the datagram size.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into the sequence of datagrams to put on the wire.
///
/// The result always holds at least one datagram.  Each is at most
/// [`crate::protocol::messages::MAX_PACKET_SIZE`] bytes.
///
/// # Examples
///
/// ```rust
/// use xbmc_events_core::protocol::{encode_message, decode_message, Message};
///
/// let datagrams = encode_message(&Message::Ping);
/// assert_eq!(datagrams.len(), 1);
/// assert_eq!(decode_message(&datagrams[0]).unwrap(), Message::Ping);
/// ```
pub fn encode_message(msg: &Message) -> Vec<Vec<u8>> {
    let payload = encode_payload(msg);
    fragment_payload(msg.packet_type(), &payload)
}

/// Splits `payload` into framed datagrams for a message of type `packet_type`.
///
/// Fragment 1 declares `packet_type`; fragments 2..N declare BLOB.
pub fn fragment_payload(packet_type: PacketType, payload: &[u8]) -> Vec<Vec<u8>> {
    let total = payload.len() / MAX_PAYLOAD_SIZE + 1;
    if total > 1 {
        trace!(?packet_type, bytes = payload.len(), fragments = total, "fragmenting payload");
    }

    (0..total)
        .map(|index| {
            let start = index * MAX_PAYLOAD_SIZE;
            let end = (start + MAX_PAYLOAD_SIZE).min(payload.len());
            let chunk = &payload[start..end];
            let declared = if index == 0 { packet_type } else { PacketType::Blob };
            let header = WireHeader::new(declared, total as u32, index as u32 + 1, chunk.len() as u16);

            let mut datagram = Vec::with_capacity(HEADER_SIZE + chunk.len());
            datagram.extend_from_slice(&header.encode());
            datagram.extend_from_slice(chunk);
            datagram
        })
        .collect()
}

/// Splits one datagram into its header and payload slice.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the header is invalid or the datagram is
/// shorter than the declared payload.
pub fn decode_datagram(bytes: &[u8]) -> Result<(WireHeader, &[u8]), ProtocolError> {
    let header = WireHeader::decode(bytes)?;
    let declared = header.payload_len as usize;
    let available = bytes.len() - HEADER_SIZE;
    if available < declared {
        return Err(ProtocolError::PayloadLengthMismatch { declared, available });
    }
    Ok((header, &bytes[HEADER_SIZE..HEADER_SIZE + declared]))
}

/// Decodes a complete single-fragment message from one datagram.
///
/// # Errors
///
/// Returns [`ProtocolError::Fragmented`] for datagrams that belong to a
/// multi-fragment message, or any decode error of the header or payload.
pub fn decode_message(bytes: &[u8]) -> Result<Message, ProtocolError> {
    let (header, payload) = decode_datagram(bytes)?;
    if header.total != 1 {
        return Err(ProtocolError::Fragmented { total: header.total });
    }
    decode_payload(header.packet_type, payload)
}

// ── Payload encoding ──────────────────────────────────────────────────────────

/// Serialises the logical (unfragmented) payload of `msg`.
pub fn encode_payload(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    match msg {
        Message::Helo(m) => encode_helo(&mut buf, m),
        Message::Bye | Message::Ping => {} // empty payload
        Message::Button(m) => encode_button(&mut buf, m),
        Message::Mouse(m) => encode_mouse(&mut buf, m),
        Message::Notification(m) => encode_notification(&mut buf, m),
        Message::Log(m) => {
            buf.push(m.level as u8);
            write_cstr(&mut buf, &m.message);
        }
        Message::Action(m) => {
            buf.push(m.action_type as u8);
            write_cstr(&mut buf, &m.action);
        }
        Message::Broadcast(raw) | Message::Blob(raw) | Message::Debug(raw) => {
            buf.extend_from_slice(raw)
        }
    }
    buf
}

fn encode_helo(buf: &mut Vec<u8>, m: &HeloMessage) {
    write_cstr(buf, &m.device_name);
    buf.push(m.icon_type as u8);
    buf.push(0x00); // port (unused)
    buf.push(0x00);
    buf.extend_from_slice(&[0u8; 8]); // reserved
    if m.icon_type != IconType::None {
        buf.extend_from_slice(&m.icon_data);
    }
}

fn encode_notification(buf: &mut Vec<u8>, m: &NotificationMessage) {
    write_cstr(buf, &m.title);
    write_cstr(buf, &m.message);
    buf.push(m.icon_type as u8);
    buf.extend_from_slice(&[0u8; NOTIFICATION_RESERVED]);
    if m.icon_type != IconType::None {
        buf.extend_from_slice(&m.icon_data);
    }
}

fn encode_button(buf: &mut Vec<u8>, m: &ButtonMessage) {
    buf.extend_from_slice(&m.code.to_be_bytes());
    buf.extend_from_slice(&m.flags.0.to_be_bytes());
    buf.extend_from_slice(&m.amount.to_be_bytes());
    if m.uses_name() {
        write_cstr(buf, &m.device_map);
        write_cstr(buf, &m.name);
    }
}

fn encode_mouse(buf: &mut Vec<u8>, m: &MouseMessage) {
    buf.push(m.flags.0);
    buf.extend_from_slice(&m.x.to_be_bytes());
    buf.extend_from_slice(&m.y.to_be_bytes());
}

// ── Payload decoding ──────────────────────────────────────────────────────────

/// Decodes a complete logical payload of type `packet_type`.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload is truncated
/// or carries invalid values.
pub fn decode_payload(packet_type: PacketType, payload: &[u8]) -> Result<Message, ProtocolError> {
    match packet_type {
        PacketType::Helo => decode_helo(payload).map(Message::Helo),
        PacketType::Bye => Ok(Message::Bye),
        PacketType::Button => decode_button(payload).map(Message::Button),
        PacketType::Mouse => decode_mouse(payload).map(Message::Mouse),
        PacketType::Ping => Ok(Message::Ping),
        PacketType::Broadcast => Ok(Message::Broadcast(payload.to_vec())),
        PacketType::Notification => decode_notification(payload).map(Message::Notification),
        PacketType::Blob => Ok(Message::Blob(payload.to_vec())),
        PacketType::Log => {
            require_len(payload, 2, "Log")?;
            let level = LogLevel::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown log level: {}", payload[0]))
            })?;
            let (message, _) = read_cstr(payload, 1)?;
            Ok(Message::Log(LogMessage { level, message }))
        }
        PacketType::Action => {
            require_len(payload, 2, "Action")?;
            let action_type = ActionType::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown action type: {}", payload[0]))
            })?;
            let (action, _) = read_cstr(payload, 1)?;
            Ok(Message::Action(ActionMessage { action_type, action }))
        }
        PacketType::Debug => Ok(Message::Debug(payload.to_vec())),
    }
}

fn decode_helo(p: &[u8]) -> Result<HeloMessage, ProtocolError> {
    let (device_name, off) = read_cstr(p, 0)?;
    require_len(p, off + 1 + HELO_PADDING, "Helo")?;
    let icon_type = read_icon_type(p[off])?;
    let icon_start = off + 1 + HELO_PADDING;
    Ok(HeloMessage {
        device_name,
        icon_type,
        icon_data: p[icon_start..].to_vec(),
    })
}

fn decode_notification(p: &[u8]) -> Result<NotificationMessage, ProtocolError> {
    let (title, off) = read_cstr(p, 0)?;
    let (message, off) = read_cstr(p, off)?;
    require_len(p, off + 1 + NOTIFICATION_RESERVED, "Notification")?;
    let icon_type = read_icon_type(p[off])?;
    let icon_start = off + 1 + NOTIFICATION_RESERVED;
    Ok(NotificationMessage {
        title,
        message,
        icon_type,
        icon_data: p[icon_start..].to_vec(),
    })
}

fn decode_button(p: &[u8]) -> Result<ButtonMessage, ProtocolError> {
    require_len(p, 6, "Button")?;
    let code = u16::from_be_bytes([p[0], p[1]]);
    let flags = ButtonFlags(u16::from_be_bytes([p[2], p[3]]));
    let amount = u16::from_be_bytes([p[4], p[5]]);
    let (device_map, name) = if flags.contains(ButtonFlags::USE_NAME) {
        let (device_map, off) = read_cstr(p, 6)?;
        let (name, _) = read_cstr(p, off)?;
        (device_map, name)
    } else {
        (String::new(), String::new())
    };
    Ok(ButtonMessage {
        code,
        flags,
        amount,
        device_map,
        name,
    })
}

fn decode_mouse(p: &[u8]) -> Result<MouseMessage, ProtocolError> {
    require_len(p, 5, "Mouse")?;
    Ok(MouseMessage {
        flags: MouseFlags(p[0]),
        x: u16::from_be_bytes([p[1], p[2]]),
        y: u16::from_be_bytes([p[3], p[4]]),
    })
}

// ── Low-level helpers ─────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_icon_type(byte: u8) -> Result<IconType, ProtocolError> {
    IconType::try_from(byte)
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown icon type: {byte}")))
}

/// Writes `s` followed by a NUL byte.  Anything after an embedded NUL is
/// dropped, as the receiver would stop reading there anyway.
fn write_cstr(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    buf.extend_from_slice(&bytes[..end]);
    buf.push(0x00);
}

/// Reads a NUL-terminated UTF-8 string starting at `offset`.
/// Returns the string and the offset of the byte after the terminator.
fn read_cstr(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    let tail = buf.get(offset..).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("string offset {offset} beyond buffer"))
    })?;
    let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("unterminated string at offset {offset}"))
    })?;
    let s = std::str::from_utf8(&tail[..len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, offset + len + 1))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::*;

    fn single_datagram(msg: &Message) -> Vec<u8> {
        let mut datagrams = encode_message(msg);
        assert_eq!(datagrams.len(), 1, "expected a single fragment");
        datagrams.remove(0)
    }

    fn reassemble(datagrams: &[Vec<u8>]) -> (PacketType, Vec<u8>) {
        let mut payload = Vec::new();
        let mut first_type = None;
        for (i, d) in datagrams.iter().enumerate() {
            let (header, chunk) = decode_datagram(d).expect("datagram must decode");
            assert_eq!(header.sequence as usize, i + 1);
            assert_eq!(header.total as usize, datagrams.len());
            first_type.get_or_insert(header.packet_type);
            payload.extend_from_slice(chunk);
        }
        (first_type.expect("at least one fragment"), payload)
    }

    // ── End-to-end wire layouts ──────────────────────────────────────────────

    #[test]
    fn test_named_button_wire_bytes() {
        // Arrange
        let msg = Message::Button(ButtonMessage::named(
            "Select",
            "R1",
            ButtonFlags::DOWN | ButtonFlags::NO_REPEAT | ButtonFlags::QUEUE,
            0,
        ));

        // Act
        let datagram = single_datagram(&msg);

        // Assert
        let (header, payload) = decode_datagram(&datagram).unwrap();
        assert_eq!(header.packet_type, PacketType::Button);
        assert_eq!((header.sequence, header.total), (1, 1));
        let mut expected = vec![0x00, 0x00, 0x00, 0x33, 0x00, 0x00];
        expected.extend_from_slice(b"R1\0Select\0");
        assert_eq!(payload, expected.as_slice());
        assert_eq!(header.payload_len as usize, expected.len());
    }

    #[test]
    fn test_helo_without_icon_wire_bytes() {
        // Arrange
        let msg = Message::Helo(HeloMessage::new("Example Remote"));

        // Act
        let datagram = single_datagram(&msg);

        // Assert
        let (header, payload) = decode_datagram(&datagram).unwrap();
        assert_eq!(header.packet_type, PacketType::Helo);
        let mut expected = b"Example Remote\0".to_vec();
        expected.extend_from_slice(&[0x00, 0x00, 0x00]);
        expected.extend_from_slice(&[0u8; 8]);
        assert_eq!(payload, expected.as_slice());
    }

    #[test]
    fn test_release_button_omits_strings() {
        let datagram = single_datagram(&Message::Button(ButtonMessage::release()));
        let (_, payload) = decode_datagram(&datagram).unwrap();
        assert_eq!(payload, &[0x00, 0x00, 0x00, 0x04, 0x00, 0x00]);
    }

    #[test]
    fn test_raw_code_button_has_exactly_one_direction() {
        for flags in [0, ButtonFlags::DOWN, ButtonFlags::UP, ButtonFlags::DOWN | ButtonFlags::UP] {
            let btn = ButtonMessage::named("", "", flags | ButtonFlags::USE_NAME, 0);
            assert!(!btn.flags.contains(ButtonFlags::USE_NAME));
            assert!(btn.flags.is_down() ^ btn.flags.is_up(), "flags {flags:#x}");
        }
    }

    #[test]
    fn test_mouse_wire_bytes() {
        let datagram = single_datagram(&Message::Mouse(MouseMessage::absolute(0x1234, 0xFFFF)));
        let (_, payload) = decode_datagram(&datagram).unwrap();
        assert_eq!(payload, &[0x01, 0x12, 0x34, 0xFF, 0xFF]);
    }

    #[test]
    fn test_log_wire_bytes() {
        let msg = Message::Log(LogMessage {
            level: LogLevel::Warning,
            message: "low battery".to_string(),
        });
        let datagram = single_datagram(&msg);
        let (_, payload) = decode_datagram(&datagram).unwrap();
        assert_eq!(payload, b"\x03low battery\0");
    }

    #[test]
    fn test_ping_and_bye_have_empty_payloads() {
        for msg in [Message::Ping, Message::Bye] {
            let datagram = single_datagram(&msg);
            assert_eq!(datagram.len(), HEADER_SIZE);
            assert_eq!(decode_message(&datagram).unwrap(), msg);
        }
    }

    // ── Decoding ─────────────────────────────────────────────────────────────

    #[test]
    fn test_notification_with_icon_decodes() {
        // Arrange
        let msg = Message::Notification(NotificationMessage {
            title: "Battery".to_string(),
            message: "Wii Remote battery at 10%".to_string(),
            icon_type: IconType::Png,
            icon_data: vec![0x89, b'P', b'N', b'G'],
        });

        // Act
        let decoded = decode_message(&single_datagram(&msg)).expect("decode");

        // Assert
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_action_decodes() {
        let msg = Message::Action(ActionMessage {
            action_type: ActionType::ExecBuiltin,
            action: "ActivateWindow(Home)".to_string(),
        });
        assert_eq!(decode_message(&single_datagram(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_named_button_decodes_to_equal_message() {
        let msg = Message::Button(ButtonMessage::named("menu", "R2", ButtonFlags::DOWN, 0));
        assert_eq!(decode_message(&single_datagram(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_decode_button_missing_name_terminator_is_malformed() {
        let payload = [0x00, 0x00, 0x00, 0x03, 0x00, 0x00, b'R', b'1'];
        assert!(matches!(
            decode_payload(PacketType::Button, &payload),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_log_with_bad_level_is_malformed() {
        assert!(matches!(
            decode_payload(PacketType::Log, b"\x09oops\0"),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_datagram_rejects_truncated_payload() {
        // Arrange
        let mut datagram = single_datagram(&Message::Mouse(MouseMessage::absolute(1, 2)));
        datagram.truncate(HEADER_SIZE + 3);

        // Act / Assert
        assert_eq!(
            decode_datagram(&datagram),
            Err(ProtocolError::PayloadLengthMismatch { declared: 5, available: 3 })
        );
    }

    #[test]
    fn test_decode_message_refuses_fragments() {
        let helo = Message::Helo(HeloMessage {
            device_name: "big".to_string(),
            icon_type: IconType::Jpeg,
            icon_data: vec![0xAB; 3000],
        });
        let datagrams = encode_message(&helo);
        assert_eq!(
            decode_message(&datagrams[0]),
            Err(ProtocolError::Fragmented { total: datagrams.len() as u32 })
        );
    }

    #[test]
    fn test_write_cstr_truncates_at_embedded_nul() {
        let mut buf = Vec::new();
        write_cstr(&mut buf, "ab\0cd");
        assert_eq!(buf, b"ab\0");
    }

    // ── Fragmentation ────────────────────────────────────────────────────────

    #[test]
    fn test_fragment_count_and_reassembly() {
        for size in [0usize, 1, 991, 992, 993, 1984, 2500, 10_000] {
            // Arrange
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();

            // Act
            let datagrams = fragment_payload(PacketType::Notification, &payload);

            // Assert
            assert_eq!(datagrams.len(), size / 992 + 1, "size {size}");
            let (_, rebuilt) = reassemble(&datagrams);
            assert_eq!(rebuilt, payload, "size {size}");
            for d in &datagrams[..datagrams.len() - 1] {
                assert_eq!(d.len(), MAX_PACKET_SIZE, "non-final fragments are full");
            }
            assert!(datagrams.iter().all(|d| d.len() <= MAX_PACKET_SIZE));
        }
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_fragment() {
        let datagrams = fragment_payload(PacketType::Blob, &[7u8; 992]);
        assert_eq!(datagrams.len(), 2);
        assert_eq!(datagrams[1].len(), HEADER_SIZE);
    }

    #[test]
    fn test_continuation_fragments_declare_blob() {
        // Arrange
        let helo = Message::Helo(HeloMessage {
            device_name: "Wii Remote".to_string(),
            icon_type: IconType::Png,
            icon_data: vec![0x55; 2100],
        });

        // Act
        let datagrams = encode_message(&helo);

        // Assert
        assert_eq!(datagrams.len(), 3);
        let types: Vec<PacketType> = datagrams
            .iter()
            .map(|d| decode_datagram(d).unwrap().0.packet_type)
            .collect();
        assert_eq!(types, vec![PacketType::Helo, PacketType::Blob, PacketType::Blob]);
    }

    #[test]
    fn test_reassembled_helo_decodes_with_icon() {
        let helo = Message::Helo(HeloMessage {
            device_name: "Apple Remote".to_string(),
            icon_type: IconType::Gif,
            icon_data: (0..1500).map(|i| i as u8).collect(),
        });
        let (ty, payload) = reassemble(&encode_message(&helo));
        assert_eq!(decode_payload(ty, &payload).unwrap(), helo);
    }
}

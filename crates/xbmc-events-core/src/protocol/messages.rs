//! All EventServer packet types and their payload structs.
//!
//! Payload strings are NUL-terminated on the wire; multi-byte integers are
//! big-endian.  The typed structs here never contain the terminators.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// ASCII signature opening every datagram.
pub const SIGNATURE: [u8; 4] = *b"XBMC";

/// Protocol major version byte.
pub const PROTOCOL_MAJOR: u8 = 2;

/// Protocol minor version byte.
pub const PROTOCOL_MINOR: u8 = 0;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Largest datagram the EventServer accepts.
pub const MAX_PACKET_SIZE: usize = 1024;

/// Largest payload carried by a single fragment.
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// UDP port the EventServer listens on by default.
pub const DEFAULT_PORT: u16 = 9777;

// ── Packet type codes ─────────────────────────────────────────────────────────

/// Packet type codes carried in header bytes 6–7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PacketType {
    Helo = 0x01,
    Bye = 0x02,
    Button = 0x03,
    Mouse = 0x04,
    Ping = 0x05,
    Broadcast = 0x06,
    Notification = 0x07,
    Blob = 0x08,
    Log = 0x09,
    Action = 0x0A,
    Debug = 0xFF,
}

impl TryFrom<u16> for PacketType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0x01 => Ok(PacketType::Helo),
            0x02 => Ok(PacketType::Bye),
            0x03 => Ok(PacketType::Button),
            0x04 => Ok(PacketType::Mouse),
            0x05 => Ok(PacketType::Ping),
            0x06 => Ok(PacketType::Broadcast),
            0x07 => Ok(PacketType::Notification),
            0x08 => Ok(PacketType::Blob),
            0x09 => Ok(PacketType::Log),
            0x0A => Ok(PacketType::Action),
            0xFF => Ok(PacketType::Debug),
            _ => Err(()),
        }
    }
}

// ── Icon types ────────────────────────────────────────────────────────────────

/// Image format of the icon attached to HELO and NOTIFICATION packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum IconType {
    #[default]
    None = 0x00,
    Jpeg = 0x01,
    Png = 0x02,
    Gif = 0x03,
}

impl IconType {
    /// Guesses the icon type from a file extension (case-insensitive).
    ///
    /// Unknown extensions yield [`IconType::None`].
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => IconType::Jpeg,
            "png" => IconType::Png,
            "gif" => IconType::Gif,
            _ => IconType::None,
        }
    }
}

impl TryFrom<u8> for IconType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x00 => Ok(IconType::None),
            0x01 => Ok(IconType::Jpeg),
            0x02 => Ok(IconType::Png),
            0x03 => Ok(IconType::Gif),
            _ => Err(()),
        }
    }
}

// ── Log levels ────────────────────────────────────────────────────────────────

/// Severity carried in LOG packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Notice = 2,
    Warning = 3,
    Error = 4,
    Severe = 5,
    Fatal = 6,
    None = 7,
}

impl TryFrom<u8> for LogLevel {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LogLevel::Debug),
            1 => Ok(LogLevel::Info),
            2 => Ok(LogLevel::Notice),
            3 => Ok(LogLevel::Warning),
            4 => Ok(LogLevel::Error),
            5 => Ok(LogLevel::Severe),
            6 => Ok(LogLevel::Fatal),
            7 => Ok(LogLevel::None),
            _ => Err(()),
        }
    }
}

// ── Action types ──────────────────────────────────────────────────────────────

/// What the receiver should do with the string in an ACTION packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    /// Execute a built-in function, e.g. `"ActivateWindow(Home)"`.
    ExecBuiltin = 0x01,
    /// Run a named action through the button translator.
    Button = 0x02,
}

impl TryFrom<u8> for ActionType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(ActionType::ExecBuiltin),
            0x02 => Ok(ActionType::Button),
            _ => Err(()),
        }
    }
}

// ── Button flags ──────────────────────────────────────────────────────────────

/// Bitmask sent in the BUTTON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonFlags(pub u16);

impl ButtonFlags {
    pub const USE_NAME: u16 = 0x01;
    pub const DOWN: u16 = 0x02;
    pub const UP: u16 = 0x04;
    pub const USE_AMOUNT: u16 = 0x08;
    pub const QUEUE: u16 = 0x10;
    pub const NO_REPEAT: u16 = 0x20;

    /// Returns `true` if every bit of `bits` is set.
    pub fn contains(&self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    /// Returns `true` if this is a key-down event.
    pub fn is_down(&self) -> bool {
        self.contains(Self::DOWN)
    }

    /// Returns `true` if this is a key-up (release) event.
    pub fn is_up(&self) -> bool {
        self.contains(Self::UP)
    }

    /// Returns `true` if the receiver must not auto-repeat this button.
    pub fn no_repeat(&self) -> bool {
        self.contains(Self::NO_REPEAT)
    }
}

// ── Mouse flags ───────────────────────────────────────────────────────────────

/// Bitmask sent in the MOUSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseFlags(pub u8);

impl MouseFlags {
    /// X/Y are an absolute position scaled to 0..=65535.
    pub const ABSOLUTE: u8 = 0x01;
}

// ── Per-packet payload structs ────────────────────────────────────────────────

/// HELO (0x01): opens a session and identifies the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeloMessage {
    /// Name shown by the media center for this client.
    pub device_name: String,
    /// Format of `icon_data`; [`IconType::None`] when no icon is attached.
    pub icon_type: IconType,
    /// Raw icon file bytes; may span several fragments.
    pub icon_data: Vec<u8>,
}

impl HeloMessage {
    /// A HELO without an icon.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            icon_type: IconType::None,
            icon_data: Vec::new(),
        }
    }
}

/// BUTTON (0x03): a key press or release.
///
/// Use the constructors rather than a struct literal: they apply the flag
/// rules the EventServer relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonMessage {
    /// Raw button code; always 0 for named buttons.
    pub code: u16,
    pub flags: ButtonFlags,
    /// Analog amount; only meaningful with [`ButtonFlags::USE_AMOUNT`].
    pub amount: u16,
    /// Button table the name is resolved against (`"KB"`, `"R1"`, `"LI:name"`...).
    pub device_map: String,
    /// Button name within `device_map`.
    pub name: String,
}

impl ButtonMessage {
    /// A named button resolved against `device_map` on the receiving side.
    ///
    /// If either string is empty the packet degrades to a raw-code packet
    /// with code 0 and both strings dropped.
    pub fn named(name: &str, device_map: &str, flags: u16, amount: u16) -> Self {
        Self::normalized(0, name, device_map, flags, amount)
    }

    /// A raw button code with no name lookup.
    pub fn with_code(code: u16, flags: u16, amount: u16) -> Self {
        Self::normalized(code, "", "", flags, amount)
    }

    /// The bare release event: code 0, `UP`, nothing else.
    pub fn release() -> Self {
        Self::normalized(0, "", "", ButtonFlags::UP, 0)
    }

    fn normalized(code: u16, name: &str, device_map: &str, flags: u16, amount: u16) -> Self {
        let mut flags = flags;
        let named = !name.is_empty() && !device_map.is_empty();
        let (code, name, device_map) = if named {
            flags |= ButtonFlags::USE_NAME;
            (0, name.to_string(), device_map.to_string())
        } else {
            flags &= !ButtonFlags::USE_NAME;
            (code, String::new(), String::new())
        };
        if amount > 0 {
            flags |= ButtonFlags::USE_AMOUNT;
        }
        if flags & ButtonFlags::UP != 0 {
            flags &= !ButtonFlags::DOWN;
        } else if flags & ButtonFlags::DOWN == 0 {
            flags |= ButtonFlags::DOWN;
        }
        Self {
            code,
            flags: ButtonFlags(flags),
            amount,
            device_map,
            name,
        }
    }

    /// Returns `true` if the name strings are carried in the payload.
    pub fn uses_name(&self) -> bool {
        self.flags.contains(ButtonFlags::USE_NAME)
    }
}

/// MOUSE (0x04): pointer position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMessage {
    pub flags: MouseFlags,
    /// 0..=65535 maps onto the receiver's screen width.
    pub x: u16,
    /// 0..=65535 maps onto the receiver's screen height.
    pub y: u16,
}

impl MouseMessage {
    /// An absolute pointer position.
    pub fn absolute(x: u16, y: u16) -> Self {
        Self {
            flags: MouseFlags(MouseFlags::ABSOLUTE),
            x,
            y,
        }
    }
}

/// NOTIFICATION (0x07): a popup on the media center screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub message: String,
    pub icon_type: IconType,
    pub icon_data: Vec<u8>,
}

/// LOG (0x09): a line for the media center's log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// ACTION (0x0A): run a built-in or a named action directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action_type: ActionType,
    pub action: String,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// A logical EventServer message, before fragmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Helo(HeloMessage),
    Bye,
    Button(ButtonMessage),
    Mouse(MouseMessage),
    Ping,
    Broadcast(Vec<u8>),
    Notification(NotificationMessage),
    Blob(Vec<u8>),
    Log(LogMessage),
    Action(ActionMessage),
    Debug(Vec<u8>),
}

impl Message {
    /// Returns the [`PacketType`] discriminant for this message.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Message::Helo(_) => PacketType::Helo,
            Message::Bye => PacketType::Bye,
            Message::Button(_) => PacketType::Button,
            Message::Mouse(_) => PacketType::Mouse,
            Message::Ping => PacketType::Ping,
            Message::Broadcast(_) => PacketType::Broadcast,
            Message::Notification(_) => PacketType::Notification,
            Message::Blob(_) => PacketType::Blob,
            Message::Log(_) => PacketType::Log,
            Message::Action(_) => PacketType::Action,
            Message::Debug(_) => PacketType::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_payload_size_is_992() {
        assert_eq!(MAX_PAYLOAD_SIZE, 992);
    }

    #[test]
    fn test_packet_type_try_from_known_codes() {
        assert_eq!(PacketType::try_from(0x03u16), Ok(PacketType::Button));
        assert_eq!(PacketType::try_from(0xFFu16), Ok(PacketType::Debug));
        assert_eq!(PacketType::try_from(0x0Bu16), Err(()));
    }

    #[test]
    fn test_named_button_sets_use_name_and_zeroes_code() {
        // Arrange / Act
        let btn = ButtonMessage::named("Select", "R1", ButtonFlags::DOWN, 0);

        // Assert
        assert!(btn.uses_name());
        assert_eq!(btn.code, 0);
        assert_eq!(btn.flags.0, ButtonFlags::USE_NAME | ButtonFlags::DOWN);
    }

    #[test]
    fn test_named_button_with_empty_map_degrades_to_raw_code() {
        // Arrange / Act
        let btn = ButtonMessage::named("Select", "", ButtonFlags::DOWN | ButtonFlags::USE_NAME, 0);

        // Assert
        assert!(!btn.uses_name());
        assert!(btn.name.is_empty());
        assert!(btn.device_map.is_empty());
    }

    #[test]
    fn test_button_without_direction_defaults_to_down() {
        let btn = ButtonMessage::with_code(42, ButtonFlags::QUEUE, 0);
        assert!(btn.flags.is_down());
        assert!(!btn.flags.is_up());
    }

    #[test]
    fn test_button_with_both_directions_keeps_only_up() {
        let btn = ButtonMessage::with_code(42, ButtonFlags::DOWN | ButtonFlags::UP, 0);
        assert!(btn.flags.is_up());
        assert!(!btn.flags.is_down());
    }

    #[test]
    fn test_button_amount_sets_use_amount() {
        let btn = ButtonMessage::named("volume", "XG", ButtonFlags::DOWN, 300);
        assert!(btn.flags.contains(ButtonFlags::USE_AMOUNT));
        assert_eq!(btn.amount, 300);
    }

    #[test]
    fn test_release_button_is_bare_up() {
        let btn = ButtonMessage::release();
        assert_eq!(btn.code, 0);
        assert_eq!(btn.flags.0, ButtonFlags::UP);
        assert_eq!(btn.amount, 0);
    }

    #[test]
    fn test_icon_type_from_extension() {
        assert_eq!(IconType::from_extension("PNG"), IconType::Png);
        assert_eq!(IconType::from_extension("jpeg"), IconType::Jpeg);
        assert_eq!(IconType::from_extension("gif"), IconType::Gif);
        assert_eq!(IconType::from_extension("bmp"), IconType::None);
    }

    #[test]
    fn test_message_packet_type_mapping() {
        assert_eq!(Message::Bye.packet_type(), PacketType::Bye);
        assert_eq!(Message::Ping.packet_type(), PacketType::Ping);
        assert_eq!(
            Message::Mouse(MouseMessage::absolute(1, 2)).packet_type(),
            PacketType::Mouse
        );
    }
}

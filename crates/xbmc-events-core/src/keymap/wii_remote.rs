//! Wii Remote key table and IR pointer mapping.
//!
//! The Wii Remote reports its buttons as a 16-bit core-button mask.  The
//! constants below use the bit positions of that report; [`KEY_NAMES`]
//! lists the same buttons in the compact bit order used by
//! [`ButtonSample`](crate::ButtonSample).
//!
//! The IR camera sees the sensor bar at 1024 × 768 resolution with the
//! X axis mirrored relative to the screen.

use crate::domain::router::{Command, CommandMap};
use crate::keymap::{DEVICE_MAP_NORMAL, DEVICE_MAP_UNIVERSAL};

/// Core-button bits of the Wii Remote report.
pub mod bits {
    pub const TWO: u16 = 0x0001;
    pub const ONE: u16 = 0x0002;
    pub const B: u16 = 0x0004;
    pub const A: u16 = 0x0008;
    pub const MINUS: u16 = 0x0010;
    pub const HOME: u16 = 0x0080;
    pub const LEFT: u16 = 0x0100;
    pub const RIGHT: u16 = 0x0200;
    pub const DOWN: u16 = 0x0400;
    pub const UP: u16 = 0x0800;
    pub const PLUS: u16 = 0x1000;
}

/// IR camera resolution.
pub const IR_MAX_X: u16 = 1024;
pub const IR_MAX_Y: u16 = 768;

/// Key names in bitmask order; index `i` matches `WiiButton::ALL[i]`.
pub const KEY_NAMES: &[&str] = &[
    "two", "one", "b", "a", "minus", "home", "left", "right", "down", "up", "plus",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WiiButton {
    Two,
    One,
    B,
    A,
    Minus,
    Home,
    Left,
    Right,
    Down,
    Up,
    Plus,
}

impl WiiButton {
    pub const ALL: [WiiButton; 11] = [
        WiiButton::Two,
        WiiButton::One,
        WiiButton::B,
        WiiButton::A,
        WiiButton::Minus,
        WiiButton::Home,
        WiiButton::Left,
        WiiButton::Right,
        WiiButton::Down,
        WiiButton::Up,
        WiiButton::Plus,
    ];

    /// Bit in the Wii Remote core-button report.
    pub fn report_bit(self) -> u16 {
        match self {
            WiiButton::Two => bits::TWO,
            WiiButton::One => bits::ONE,
            WiiButton::B => bits::B,
            WiiButton::A => bits::A,
            WiiButton::Minus => bits::MINUS,
            WiiButton::Home => bits::HOME,
            WiiButton::Left => bits::LEFT,
            WiiButton::Right => bits::RIGHT,
            WiiButton::Down => bits::DOWN,
            WiiButton::Up => bits::UP,
            WiiButton::Plus => bits::PLUS,
        }
    }

    /// Bit index in the device bitmask.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        KEY_NAMES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// Converts a raw core-button report into the compact bitmask of [`KEY_NAMES`].
pub fn report_to_mask(report: u16) -> u32 {
    WiiButton::ALL
        .iter()
        .filter(|b| report & b.report_bit() != 0)
        .fold(0, |mask, b| mask | (1 << b.index()))
}

/// Maps an IR dot position to an absolute pointer position in 0..=65535.
///
/// Readings outside the camera range are clamped.
pub fn ir_to_pointer(x: u16, y: u16) -> (u16, u16) {
    let max_x = u32::from(IR_MAX_X - 1);
    let max_y = u32::from(IR_MAX_Y - 1);
    let x = max_x - u32::from(x).min(max_x);
    let y = u32::from(y).min(max_y);
    ((x * 65535 / max_x) as u16, (y * 65535 / max_y) as u16)
}

/// Default bindings.  Universal mode makes `home` a chord prefix.
pub fn command_map(universal: bool) -> CommandMap {
    let map_name = if universal {
        DEVICE_MAP_UNIVERSAL
    } else {
        DEVICE_MAP_NORMAL
    };
    let mut map = CommandMap::new();
    map.insert("a", Command::tap("select", map_name));
    map.insert("b", Command::tap("back", map_name));
    map.insert("up", Command::repeating("up", map_name));
    map.insert("down", Command::repeating("down", map_name));
    map.insert("left", Command::repeating("left", map_name));
    map.insert("right", Command::repeating("right", map_name));
    map.insert("plus", Command::repeating("volumeplus", map_name));
    map.insert("minus", Command::repeating("volumeminus", map_name));
    map.insert("home", Command::tap("menu", map_name));
    map.insert("one", Command::tap("info", map_name));
    map.insert("two", Command::tap("title", map_name));
    if universal {
        map.insert("home+plus", Command::tap("skipplus", map_name));
        map.insert("home+minus", Command::tap("skipminus", map_name));
        map.insert("home+a", Command::tap("pause", map_name));
        map.insert("home+b", Command::tap("stop", map_name));
        map.insert("home+home", Command::tap("title", map_name));
    }
    map
}

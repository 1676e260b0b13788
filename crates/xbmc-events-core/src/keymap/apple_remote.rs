//! Apple Remote key table.
//!
//! # HID cookies (for beginners)
//!
//! The Apple Remote is read through the HID manager, which reports a key
//! press as the list of HID element "cookies" that changed.  Joining those
//! numbers with `_` gives a string that identifies the key, e.g.
//! `"31_29_28_19_18_"` is `plus` on Mac OS X 10.5.  Apple renumbered the
//! cookies between 10.4 (Tiger) and 10.5 (Leopard), so the table is picked
//! once at startup from the OS version.
//!
//! The remote reports long presses of `left`, `right`, `menu` and `play` as
//! separate cookie strings, which is why they appear as their own keys here.

use crate::domain::router::{Command, CommandMap};
use crate::keymap::{DEVICE_MAP_NORMAL, DEVICE_MAP_UNIVERSAL};

/// Key names in bitmask order; index `i` matches `AppleRemoteKey::ALL[i]`.
pub const KEY_NAMES: &[&str] = &[
    "plus",
    "minus",
    "left",
    "right",
    "play",
    "menu",
    "left_hold",
    "right_hold",
    "menu_hold",
    "play_hold",
];

/// Physical Apple Remote keys, including the long-press variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppleRemoteKey {
    Plus,
    Minus,
    Left,
    Right,
    Play,
    Menu,
    LeftHold,
    RightHold,
    MenuHold,
    PlayHold,
}

impl AppleRemoteKey {
    pub const ALL: [AppleRemoteKey; 10] = [
        AppleRemoteKey::Plus,
        AppleRemoteKey::Minus,
        AppleRemoteKey::Left,
        AppleRemoteKey::Right,
        AppleRemoteKey::Play,
        AppleRemoteKey::Menu,
        AppleRemoteKey::LeftHold,
        AppleRemoteKey::RightHold,
        AppleRemoteKey::MenuHold,
        AppleRemoteKey::PlayHold,
    ];

    /// Bit index in the device bitmask.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        KEY_NAMES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Which generation of HID cookie strings the OS produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieTable {
    /// Mac OS X 10.4.
    Tiger,
    /// Mac OS X 10.5 and later.
    Leopard,
}

impl CookieTable {
    /// Picks the table for a Mac OS X `major.minor` version.
    pub fn for_os_version(major: u32, minor: u32) -> Self {
        if major == 10 && minor < 5 {
            CookieTable::Tiger
        } else {
            CookieTable::Leopard
        }
    }

    /// Parses a version string such as `"10.4.11"`.  Returns `None` if it
    /// does not start with two numeric components.
    pub fn for_version_str(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some(Self::for_os_version(major, minor))
    }

    /// All `(cookie string, key)` pairs of this table.
    pub fn cookies(self) -> &'static [(&'static str, AppleRemoteKey)] {
        match self {
            CookieTable::Tiger => TIGER_COOKIES,
            CookieTable::Leopard => LEOPARD_COOKIES,
        }
    }

    pub fn lookup(self, cookie: &str) -> Option<AppleRemoteKey> {
        self.cookies()
            .iter()
            .find(|(c, _)| *c == cookie)
            .map(|(_, key)| *key)
    }

    /// Looks `cookie` up in every table, newest first.
    pub fn lookup_any(cookie: &str) -> Option<AppleRemoteKey> {
        [CookieTable::Leopard, CookieTable::Tiger]
            .into_iter()
            .find_map(|t| t.lookup(cookie))
    }
}

const TIGER_COOKIES: &[(&str, AppleRemoteKey)] = &[
    ("14_12_11_6_", AppleRemoteKey::Plus),
    ("14_13_11_6_", AppleRemoteKey::Minus),
    ("14_7_6_14_7_6_", AppleRemoteKey::Menu),
    ("14_8_6_14_8_6_", AppleRemoteKey::Play),
    ("14_9_6_14_9_6_", AppleRemoteKey::Right),
    ("14_10_6_14_10_6_", AppleRemoteKey::Left),
    ("14_6_4_2_", AppleRemoteKey::RightHold),
    ("14_6_3_2_", AppleRemoteKey::LeftHold),
    ("14_6_14_6_", AppleRemoteKey::MenuHold),
    ("18_14_6_18_14_6_", AppleRemoteKey::PlayHold),
];

const LEOPARD_COOKIES: &[(&str, AppleRemoteKey)] = &[
    ("31_29_28_19_18_", AppleRemoteKey::Plus),
    ("31_30_28_19_18_", AppleRemoteKey::Minus),
    ("31_20_19_18_31_20_19_18_", AppleRemoteKey::Menu),
    ("31_21_19_18_31_21_19_18_", AppleRemoteKey::Play),
    ("31_22_19_18_31_22_19_18_", AppleRemoteKey::Right),
    ("31_23_19_18_31_23_19_18_", AppleRemoteKey::Left),
    ("31_19_18_4_2_", AppleRemoteKey::RightHold),
    ("31_19_18_3_2_", AppleRemoteKey::LeftHold),
    ("31_19_18_31_19_18_", AppleRemoteKey::MenuHold),
    ("35_31_19_18_35_31_19_18_", AppleRemoteKey::PlayHold),
];

/// Default bindings.
///
/// Normal mode sends `R1` buttons.  Universal mode sends `R2` buttons and
/// turns `menu` into a chord prefix; `menu` on its own (after the chord
/// window) means `back`.
pub fn command_map(universal: bool) -> CommandMap {
    let mut map = CommandMap::new();
    if !universal {
        let r1 = DEVICE_MAP_NORMAL;
        map.insert("plus", Command::repeating("up", r1));
        map.insert("minus", Command::repeating("down", r1));
        map.insert("left", Command::tap("left", r1));
        map.insert("right", Command::tap("right", r1));
        map.insert("play", Command::tap("select", r1));
        map.insert("menu", Command::tap("menu", r1));
        map.insert("left_hold", Command::repeating("reverse", r1));
        map.insert("right_hold", Command::repeating("forward", r1));
        map.insert("menu_hold", Command::tap("title", r1));
        map.insert("play_hold", Command::tap("info", r1));
        return map;
    }

    let r2 = DEVICE_MAP_UNIVERSAL;
    map.insert("plus", Command::repeating("up", r2));
    map.insert("minus", Command::repeating("down", r2));
    map.insert("left", Command::tap("left", r2));
    map.insert("right", Command::tap("right", r2));
    map.insert("play", Command::tap("select", r2));
    map.insert("menu", Command::tap("back", r2));
    map.insert("left_hold", Command::repeating("reverse", r2));
    map.insert("right_hold", Command::repeating("forward", r2));
    map.insert("menu_hold", Command::tap("menu", r2));
    map.insert("play_hold", Command::tap("info", r2));
    map.insert("menu+plus", Command::repeating("volumeplus", r2));
    map.insert("menu+minus", Command::repeating("volumeminus", r2));
    map.insert("menu+left", Command::tap("skipminus", r2));
    map.insert("menu+right", Command::tap("skipplus", r2));
    map.insert("menu+play", Command::tap("pause", r2));
    map.insert("menu+menu", Command::tap("title", r2));
    map
}

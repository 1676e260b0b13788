//! Key tables for the supported remotes.
//!
//! Each remote exposes its keys as a fixed, ordered list of names.  The
//! position of a name in that list is also its bit in the
//! [`ButtonSample::buttons`](crate::domain::buttons::ButtonSample) bitmask a
//! device adapter produces, so one [`ButtonEventState`](crate::ButtonEventState)
//! covers every key of the remote.
//!
//! The default [`CommandMap`]s bind those names to EventServer button names:
//! device map `R1` in normal mode, `R2` in universal mode.

pub mod apple_remote;
pub mod wii_remote;

use serde::{Deserialize, Serialize};

use crate::domain::router::CommandMap;

pub use apple_remote::{AppleRemoteKey, CookieTable};
pub use wii_remote::WiiButton;

/// Device map for the normal remote button table.
pub const DEVICE_MAP_NORMAL: &str = "R1";

/// Device map for the universal-remote button table.
pub const DEVICE_MAP_UNIVERSAL: &str = "R2";

/// Which remote a client is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Apple,
    Wii,
}

impl RemoteKind {
    /// Key names in bitmask order.
    pub fn key_names(self) -> &'static [&'static str] {
        match self {
            RemoteKind::Apple => apple_remote::KEY_NAMES,
            RemoteKind::Wii => wii_remote::KEY_NAMES,
        }
    }

    /// Bit index of `name`, if the remote has such a key.
    pub fn key_index(self, name: &str) -> Option<usize> {
        self.key_names().iter().position(|k| *k == name)
    }

    /// Built-in bindings for normal or universal mode.
    pub fn default_command_map(self, universal: bool) -> CommandMap {
        match self {
            RemoteKind::Apple => apple_remote::command_map(universal),
            RemoteKind::Wii => wii_remote::command_map(universal),
        }
    }

    /// Name announced in HELO.
    pub fn device_name(self) -> &'static str {
        match self {
            RemoteKind::Apple => "Apple Remote",
            RemoteKind::Wii => "Wii Remote",
        }
    }
}

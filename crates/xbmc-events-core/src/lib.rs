//! # xbmc-events-core
//!
//! Shared library for XBMC event clients containing the EventServer wire
//! protocol codec, the button/pointer state machines that turn raw device
//! samples into clicks and holds, the chorded command router used by remote
//! controls, and the key tables for the supported remotes.
//!
//! This crate has zero dependencies on OS APIs or network sockets.  The
//! `xbmc-remote` crate supplies the UDP transport and the device adapters.
//!
//! # Architecture overview (for beginners)
//!
//! An *event client* is a small program that reads a physical input device
//! (an Apple Remote, a Wii Remote, a mouse) and forwards what the user did to
//! the media center over UDP.  The media center runs an *EventServer* on port
//! 9777 that understands a compact binary protocol.
//!
//! - **`protocol`** – How bytes travel over the network.  Every datagram
//!   carries a 32-byte header followed by at most 992 payload bytes.  Large
//!   payloads (icons, long log lines) are split across several datagrams.
//!
//! - **`domain`** – Pure input logic with no OS dependencies: click / hold /
//!   double-click classification, pointer clamping and the "universal remote"
//!   chord router.
//!
//! - **`keymap`** – Tables that translate device specific identifiers (HID
//!   cookie strings, Wii button bits) into key names, and the default command
//!   maps binding those names to EventServer buttons.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::buttons::{ButtonClass, ButtonEventState, ButtonSample};
pub use domain::pointer::{MouseState, PointerState};
pub use domain::router::{ChordState, Command, CommandMap, CommandRouter, RouterConfig};
pub use protocol::codec::{decode_datagram, decode_message, encode_message, ProtocolError};
pub use protocol::header::WireHeader;
pub use protocol::messages::Message;

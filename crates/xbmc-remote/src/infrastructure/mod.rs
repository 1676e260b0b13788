//! Infrastructure layer for the event client.
//!
//! Contains the OS-facing adapters: the UDP socket, input devices, the
//! config file, icon files and the media center launcher.
//!
//! **Dependency rule**: this layer may depend on `xbmc_events_core`, but the
//! core crate never imports it.
//!
//! # Sub-modules
//!
//! - **`device`** – the `InputDevice` trait, the failure/reconnect policy
//!   wrapper, a line-driven device and a scripted mock.
//!
//! - **`icon`** – reads the HELO icon and detects its format.
//!
//! - **`launcher`** – spawns the media center with `XBMC_HOME` set.
//!
//! - **`network`** – encodes messages and sends the datagrams over UDP.
//!
//! - **`storage`** – TOML configuration loading.

pub mod device;
pub mod icon;
pub mod launcher;
pub mod network;
pub mod storage;

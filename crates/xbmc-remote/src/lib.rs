//! xbmc-remote library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does xbmc-remote do? (for beginners)
//!
//! XBMC runs an *EventServer* that listens for small UDP packets on port
//! 9777.  A client announces itself with HELO and from then on can press
//! named buttons, move the pointer and post notifications as if it were a
//! local input device.
//!
//! This client:
//!
//! 1. Loads its configuration (server address, remote type, bindings).
//! 2. Opens an input device and polls it at a fixed rate.
//! 3. Classifies each poll into presses, holds, clicks and double clicks.
//! 4. Maps keys (or chords of keys in universal mode) to named buttons, or
//!    pointer activity to click/wheel buttons and MOUSE positions.
//! 5. Sends the resulting packets over UDP, with a PING every 45 seconds of
//!    silence and a BYE on shutdown.

/// Application layer: the remote and mouse sessions and the poll loop.
pub mod application;

/// Infrastructure layer: UDP transport, devices, config, icons, launcher.
pub mod infrastructure;

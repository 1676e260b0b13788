//! Input-side domain logic for event clients.
//!
//! This module contains pure state machines with no infrastructure
//! dependencies.  Time is always passed in as an [`std::time::Instant`] so
//! every transition can be driven deterministically from tests.
//!
//! # Data flow (for beginners)
//!
//! ```text
//! device poll ──► ButtonSample ──► ButtonEventState ──► click / hold / double-click
//!                      │                                      │
//!                      └──► MouseState (position, activity)   └──► CommandRouter ──► BUTTON packets
//! ```
//!
//! - [`buttons`] classifies per-button down/up transitions.
//! - [`pointer`] wraps the button classifier with pointer position,
//!   wheel, activity timeout and the coarse pointer state a mouse needs.
//! - [`router`] maps remote-control keys (and chords of keys) to the
//!   BUTTON packets that get sent.

pub mod buttons;
pub mod pointer;
pub mod router;

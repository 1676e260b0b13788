//! Key → BUTTON packet routing with an optional chorded "universal" mode.
//!
//! # How chords work (for beginners)
//!
//! A remote with six keys cannot reach many commands on its own.  In
//! universal mode some keys act as *chord prefixes*: pressing `menu` does
//! nothing yet, it starts a short window (500 ms by default) in which the
//! next key is combined with it.  `menu` then `plus` becomes the command
//! bound to `"menu+plus"`.  If nothing follows before the window closes,
//! whatever is bound to `"menu"` alone is sent.
//!
//! ```text
//!            key_down(k), k is a prefix (universal only)
//!   ┌──────┐ ───────────────────────────────────────────► ┌──────────────┐
//!   │ Idle │                                              │ Accumulating │ ◄─┐ key_down, no match:
//!   └──────┘ ◄─────────────────────────────────────────── └──────────────┘ ──┘ re-arm timer
//!      ▲ │      key_down completes a binding, or timer expires
//!      └─┘
//!   key_down(k), not a prefix: dispatch immediately
//! ```
//!
//! The timer is cooperative: the owner calls [`CommandRouter::poll_timer`]
//! from its poll loop, and [`CommandRouter::next_deadline`] says when that
//! is next needed.  Every method takes `now` explicitly.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::protocol::messages::{ButtonFlags, ButtonMessage};

/// Default chord window.
pub const DEFAULT_MAX_CLICK_DURATION: Duration = Duration::from_millis(500);

/// Joins the keys of a chord in [`CommandMap`] keys, e.g. `"menu+plus"`.
pub const CHORD_SEPARATOR: char = '+';

// ── Commands ──────────────────────────────────────────────────────────────────

/// One BUTTON packet to send when a key or chord is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Button name within `device_map`.
    pub name: String,
    pub device_map: String,
    /// Raw [`ButtonFlags`] bits.  `DOWN` is implied.
    pub flags: u16,
    pub amount: u16,
}

const TAP_FLAGS: u16 = ButtonFlags::DOWN | ButtonFlags::NO_REPEAT | ButtonFlags::QUEUE;

impl Command {
    /// A one-shot command: the receiver acts once and expects no release.
    pub fn tap(name: &str, device_map: &str) -> Self {
        Self {
            name: name.to_string(),
            device_map: device_map.to_string(),
            flags: TAP_FLAGS,
            amount: 0,
        }
    }

    /// A repeating command: the receiver repeats it until a release arrives.
    pub fn repeating(name: &str, device_map: &str) -> Self {
        Self {
            name: name.to_string(),
            device_map: device_map.to_string(),
            flags: ButtonFlags::DOWN,
            amount: 0,
        }
    }

    /// Builds the BUTTON packet for this command.
    pub fn to_message(&self) -> ButtonMessage {
        ButtonMessage::named(&self.name, &self.device_map, self.flags, self.amount)
    }

    /// Returns `true` if a release packet must follow once the key goes up.
    pub fn needs_release(&self) -> bool {
        !ButtonFlags(self.flags).no_repeat()
    }
}

/// Key (or chord) → command table.
///
/// A key maps to a sequence so that compound bindings can emit several
/// packets for one press.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandMap {
    entries: HashMap<String, Vec<Command>>,
}

impl CommandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to a single command, replacing any earlier binding.
    pub fn insert(&mut self, key: impl Into<String>, command: Command) {
        self.entries.insert(key.into(), vec![command]);
    }

    /// Binds `key` to a sequence of commands sent in order.
    pub fn insert_sequence(&mut self, key: impl Into<String>, commands: Vec<Command>) {
        self.entries.insert(key.into(), commands);
    }

    pub fn get(&self, key: &str) -> Option<&[Command]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Returns `true` if some binding extends `keys` with at least one more key.
    pub fn is_chord_prefix(&self, keys: &str) -> bool {
        self.entries.keys().any(|k| {
            k.len() > keys.len()
                && k.starts_with(keys)
                && k[keys.len()..].starts_with(CHORD_SEPARATOR)
        })
    }

    /// Copies every binding of `other` over this map.
    pub fn extend(&mut self, other: CommandMap) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Router behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Enables chord accumulation on prefix keys.
    pub universal: bool,
    /// How long a partial chord waits for its next key.
    pub max_click_duration: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            universal: false,
            max_click_duration: DEFAULT_MAX_CLICK_DURATION,
        }
    }
}

/// Whether a chord is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChordState {
    #[default]
    Idle,
    Accumulating,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChordTimer {
    deadline: Option<Instant>,
}

impl ChordTimer {
    fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }

    fn expired(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |d| now >= d)
    }
}

/// Turns key presses into BUTTON packets, one instance per remote.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    map: CommandMap,
    config: RouterConfig,
    buffer: String,
    timer: ChordTimer,
    release_pending: bool,
}

impl CommandRouter {
    pub fn new(map: CommandMap, config: RouterConfig) -> Self {
        Self {
            map,
            config,
            buffer: String::new(),
            timer: ChordTimer::default(),
            release_pending: false,
        }
    }

    pub fn config(&self) -> RouterConfig {
        self.config
    }

    pub fn map(&self) -> &CommandMap {
        &self.map
    }

    pub fn state(&self) -> ChordState {
        if self.buffer.is_empty() {
            ChordState::Idle
        } else {
            ChordState::Accumulating
        }
    }

    /// When [`poll_timer`](Self::poll_timer) must next be called, if a chord is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline
    }

    /// Handles a key press and returns the packets to send.
    ///
    /// A chord whose window has already closed is flushed first.
    pub fn key_down(&mut self, key: &str, now: Instant) -> Vec<ButtonMessage> {
        let mut out = self.poll_timer(now);

        if self.buffer.is_empty() {
            if self.config.universal && self.map.is_chord_prefix(key) {
                debug!(key, "chord started");
                self.buffer.push_str(key);
                self.timer.arm(now, self.config.max_click_duration);
            } else {
                out.extend(self.dispatch(key));
            }
            return out;
        }

        self.buffer.push(CHORD_SEPARATOR);
        self.buffer.push_str(key);
        if self.map.get(&self.buffer).is_some() {
            let chord = std::mem::take(&mut self.buffer);
            self.timer.disarm();
            out.extend(self.dispatch(&chord));
        } else {
            debug!(chord = %self.buffer, "chord incomplete, waiting");
            self.timer.arm(now, self.config.max_click_duration);
        }
        out
    }

    /// Handles a key release.  Returns a release packet only if the last
    /// dispatched command repeats on the receiver.
    pub fn key_up(&mut self, _key: &str) -> Option<ButtonMessage> {
        if std::mem::take(&mut self.release_pending) {
            Some(ButtonMessage::release())
        } else {
            None
        }
    }

    /// Flushes the pending chord if its window has closed.
    pub fn poll_timer(&mut self, now: Instant) -> Vec<ButtonMessage> {
        if !self.timer.expired(now) {
            return Vec::new();
        }
        self.timer.disarm();
        let chord = std::mem::take(&mut self.buffer);
        debug!(%chord, "chord window closed");
        self.dispatch(&chord)
    }

    /// Drops any pending chord and release without sending anything.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.timer.disarm();
        self.release_pending = false;
    }

    fn dispatch(&mut self, key: &str) -> Vec<ButtonMessage> {
        let Some(commands) = self.map.get(key) else {
            debug!(key, "no binding, dropped");
            return Vec::new();
        };
        if let Some(last) = commands.last() {
            self.release_pending = last.needs_release();
        }
        commands.iter().map(Command::to_message).collect()
    }
}

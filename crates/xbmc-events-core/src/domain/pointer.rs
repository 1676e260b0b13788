//! Pointer state for mouse-like devices.
//!
//! [`MouseState`] owns a [`ButtonEventState`] for the five mouse buttons and
//! adds what a pointer needs on top of it:
//!
//! - a position clamped to `[0, max_x] × [0, max_y]`, moved by relative
//!   deltas or set directly from an absolute (IR) reading,
//! - the wheel delta of the current poll,
//! - an `active` flag that drops after 5 s without movement or buttons,
//! - a coarse [`PointerState`] that snaps back to `Normal` whenever no
//!   button is down.
//!
//! A missing sample (device read failure) is treated as "no movement, no
//! buttons down".

use std::time::{Duration, Instant};

use crate::domain::buttons::{ButtonClass, ButtonEventState, ButtonSample};

/// Inactivity period after which the pointer is reported inactive.
pub const ACTIVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Number of mouse buttons tracked.
pub const MOUSE_MAX_BUTTON: usize = 5;

/// Button indices within [`ButtonSample::buttons`].
pub mod button {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const MIDDLE: usize = 2;
    pub const X1: usize = 3;
    pub const X2: usize = 4;
}

/// Full-scale value of absolute coordinates.
const ABSOLUTE_RANGE: i64 = 65535;

/// Coarse interaction state of the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerState {
    /// No button down.
    #[default]
    Normal,
    /// A button is down and the pointer has not moved since.
    Click,
    /// A button is held while the pointer moves.
    Drag,
}

/// Pointer position, buttons and activity of one mouse-like device.
#[derive(Debug, Clone)]
pub struct MouseState {
    x: i32,
    y: i32,
    max_x: i32,
    max_y: i32,
    wheel: i32,
    moved: bool,
    buttons: ButtonEventState,
    active: bool,
    last_active: Option<Instant>,
    active_timeout: Duration,
    pointer_state: PointerState,
}

impl MouseState {
    /// Creates a pointer centred in `[0, max_x] × [0, max_y]`.
    pub fn new(max_x: i32, max_y: i32) -> Self {
        let max_x = max_x.max(0);
        let max_y = max_y.max(0);
        Self {
            x: max_x / 2,
            y: max_y / 2,
            max_x,
            max_y,
            wheel: 0,
            moved: false,
            buttons: ButtonEventState::new(MOUSE_MAX_BUTTON),
            active: false,
            last_active: None,
            active_timeout: ACTIVE_TIMEOUT,
            pointer_state: PointerState::Normal,
        }
    }

    /// Changes the clamping bounds, pulling the current position inside them.
    pub fn set_resolution(&mut self, max_x: i32, max_y: i32) {
        self.max_x = max_x.max(0);
        self.max_y = max_y.max(0);
        self.x = self.x.clamp(0, self.max_x);
        self.y = self.y.clamp(0, self.max_y);
    }

    /// Applies one poll's sample.  `None` means the device could not be read.
    pub fn update(&mut self, sample: Option<&ButtonSample>, now: Instant) {
        let sample = sample.copied().unwrap_or_default();
        let before = (self.x, self.y);

        match sample.absolute {
            Some((ax, ay)) => {
                self.x = scale_from_absolute(ax, self.max_x);
                self.y = scale_from_absolute(ay, self.max_y);
            }
            None => {
                self.x = self.x.saturating_add(sample.dx).clamp(0, self.max_x);
                self.y = self.y.saturating_add(sample.dy).clamp(0, self.max_y);
            }
        }
        self.moved = (self.x, self.y) != before;
        self.wheel = sample.dz;

        self.buttons.update(sample.buttons, now);

        let activity = sample.has_motion() || sample.buttons != 0;
        if activity {
            self.active = true;
            self.last_active = Some(now);
        } else if self
            .last_active
            .map_or(true, |t| now.saturating_duration_since(t) > self.active_timeout)
        {
            self.active = false;
        }

        self.pointer_state = if !self.buttons.any_down() {
            PointerState::Normal
        } else if self.moved && self.pointer_state != PointerState::Normal {
            PointerState::Drag
        } else if self.pointer_state == PointerState::Normal {
            PointerState::Click
        } else {
            self.pointer_state
        };
    }

    /// Current position in device coordinates.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Current position scaled to the 0..=65535 range of MOUSE packets.
    pub fn scaled_position(&self) -> (u16, u16) {
        (scale_to_absolute(self.x, self.max_x), scale_to_absolute(self.y, self.max_y))
    }

    /// Returns `true` if the position changed in the most recent poll.
    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Wheel delta of the most recent poll.
    pub fn wheel(&self) -> i32 {
        self.wheel
    }

    /// Classification of mouse button `index` in the most recent poll.
    pub fn class(&self, index: usize) -> ButtonClass {
        self.buttons.class(index)
    }

    /// Returns `true` while the device has seen activity within the timeout.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pointer_state(&self) -> PointerState {
        self.pointer_state
    }
}

fn scale_from_absolute(value: u16, max: i32) -> i32 {
    (i64::from(value) * i64::from(max) / ABSOLUTE_RANGE) as i32
}

fn scale_to_absolute(value: i32, max: i32) -> u16 {
    if max <= 0 {
        return 0;
    }
    (i64::from(value.clamp(0, max)) * ABSOLUTE_RANGE / i64::from(max)) as u16
}

//! Per-button click / hold / double-click classification.
//!
//! Once per poll every tracked button is classified from its current
//! down state, its state in the previous poll and the time of its last
//! click:
//!
//! | previous | current | classification                                    |
//! |----------|---------|---------------------------------------------------|
//! | up       | up      | `None`                                            |
//! | up       | down    | `DoubleClick` if the last click was < 500 ms ago, else `Pressed` |
//! | down     | down    | `Hold`                                            |
//! | down     | up      | `Click` (and the click time is recorded)          |
//!
//! A click is only reported on release, so `Click`, `DoubleClick` and
//! `Hold` are mutually exclusive within one poll.

use std::time::{Duration, Instant};

/// Window within which a second press counts as a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);

/// Raw device readout for one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonSample {
    /// Bit `i` set means button `i` is held down.
    pub buttons: u32,
    /// Relative X movement since the previous poll.
    pub dx: i32,
    /// Relative Y movement since the previous poll.
    pub dy: i32,
    /// Wheel movement since the previous poll.
    pub dz: i32,
    /// Absolute pointer position scaled to 0..=65535 (IR cameras, tablets).
    pub absolute: Option<(u16, u16)>,
}

impl ButtonSample {
    /// A sample with only `buttons` held and no movement.
    pub fn with_buttons(buttons: u32) -> Self {
        Self {
            buttons,
            ..Self::default()
        }
    }

    /// Returns `true` if button `index` is down.
    pub fn is_down(&self, index: usize) -> bool {
        index < 32 && self.buttons & (1 << index) != 0
    }

    /// Returns `true` if the sample reports any pointer or wheel movement.
    pub fn has_motion(&self) -> bool {
        self.dx != 0 || self.dy != 0 || self.dz != 0 || self.absolute.is_some()
    }
}

/// Result of classifying one button for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonClass {
    /// Not down, and not released this poll.
    #[default]
    None,
    /// Fresh press outside the double-click window.
    Pressed,
    /// Still down since the previous poll.
    Hold,
    /// Released this poll.
    Click,
    /// Fresh press within the double-click window of the previous click.
    DoubleClick,
}

impl ButtonClass {
    /// Returns `true` for the two classes produced by a fresh press.
    pub fn is_press(self) -> bool {
        matches!(self, ButtonClass::Pressed | ButtonClass::DoubleClick)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonSlot {
    was_down: bool,
    last_click: Option<Instant>,
}

/// Click-tracking state for a fixed set of buttons.
#[derive(Debug, Clone)]
pub struct ButtonEventState {
    slots: Vec<ButtonSlot>,
    classes: Vec<ButtonClass>,
    double_click_window: Duration,
}

impl ButtonEventState {
    /// Tracks buttons `0..count` (at most 32) with the default 500 ms window.
    pub fn new(count: usize) -> Self {
        Self::with_window(count, DOUBLE_CLICK_WINDOW)
    }

    /// Tracks buttons `0..count` with a custom double-click window.
    pub fn with_window(count: usize, double_click_window: Duration) -> Self {
        let count = count.min(32);
        Self {
            slots: vec![ButtonSlot::default(); count],
            classes: vec![ButtonClass::None; count],
            double_click_window,
        }
    }

    /// Number of tracked buttons.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no buttons are tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Classifies every tracked button against the bitmask `buttons`.
    ///
    /// Returns the classification of each button, indexed by button.
    pub fn update(&mut self, buttons: u32, now: Instant) -> &[ButtonClass] {
        let window = self.double_click_window;
        for (i, (slot, class)) in self.slots.iter_mut().zip(self.classes.iter_mut()).enumerate() {
            let down = buttons & (1 << i) != 0;
            *class = match (slot.was_down, down) {
                (true, true) => ButtonClass::Hold,
                (false, true) => match slot.last_click {
                    Some(at) if now.saturating_duration_since(at) < window => ButtonClass::DoubleClick,
                    _ => ButtonClass::Pressed,
                },
                (true, false) => {
                    slot.last_click = Some(now);
                    ButtonClass::Click
                }
                (false, false) => ButtonClass::None,
            };
            slot.was_down = down;
        }
        &self.classes
    }

    /// Classification of button `index` from the most recent poll.
    pub fn class(&self, index: usize) -> ButtonClass {
        self.classes.get(index).copied().unwrap_or_default()
    }

    /// Returns `true` if button `index` was down in the most recent poll.
    pub fn is_down(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |s| s.was_down)
    }

    /// Returns `true` if any tracked button was down in the most recent poll.
    pub fn any_down(&self) -> bool {
        self.slots.iter().any(|s| s.was_down)
    }

    /// Forgets all down states and click times.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = ButtonSlot::default());
        self.classes.iter_mut().for_each(|c| *c = ButtonClass::None);
    }
}

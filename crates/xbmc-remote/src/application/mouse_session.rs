//! Pointer session.
//!
//! [`MouseState`] tracks position and per-button classification; this
//! session turns the result into packets:
//!
//! | Event                                    | Packet                        |
//! |------------------------------------------|-------------------------------|
//! | pointer moved                            | MOUSE, absolute 0..=65535     |
//! | left released (no drag, no long click)   | BUTTON `leftclick`            |
//! | left pressed again within 500 ms         | BUTTON `doubleclick`          |
//! | left held ≥ 1 s without moving           | BUTTON `longclick`            |
//! | right / middle released                  | BUTTON `rightclick` / `middleclick` |
//! | wheel up / down                          | BUTTON `wheelup` / `wheeldown`|
//!
//! Every BUTTON is a one-shot (`DOWN | NO_REPEAT | QUEUE`) on the configured
//! device map, `LI:mouse` by default.

use std::time::{Duration, Instant};

use xbmc_events_core::domain::pointer::button;
use xbmc_events_core::protocol::{ButtonFlags, ButtonMessage, MouseMessage};
use xbmc_events_core::{ButtonClass, ButtonSample, Message, MouseState, PointerState};

use super::{Session, SessionLink};

/// Hold time after which a motionless left press becomes a long click.
pub const LONG_CLICK_DURATION: Duration = Duration::from_millis(1000);

/// Device map the click names are resolved against by default.
pub const DEFAULT_MOUSE_DEVICE_MAP: &str = "LI:mouse";

/// Input names of the mouse buttons, in bitmask order.
pub const MOUSE_BUTTON_NAMES: [&str; 5] = ["left", "right", "middle", "x1", "x2"];

const CLICK_FLAGS: u16 = ButtonFlags::DOWN | ButtonFlags::NO_REPEAT | ButtonFlags::QUEUE;

pub struct MouseSession {
    link: SessionLink,
    state: MouseState,
    device_map: String,
    left_down_at: Option<Instant>,
    // Set once the current left press has produced its packet (double or
    // long click) or turned into a drag; the release then sends nothing.
    left_consumed: bool,
}

impl MouseSession {
    pub fn new(link: SessionLink, state: MouseState, device_map: impl Into<String>) -> Self {
        Self {
            link,
            state,
            device_map: device_map.into(),
            left_down_at: None,
            left_consumed: false,
        }
    }

    pub fn state(&self) -> &MouseState {
        &self.state
    }

    fn click(&mut self, name: &str, now: Instant) {
        let packet = ButtonMessage::named(name, &self.device_map, CLICK_FLAGS, 0);
        self.link.send_button(packet, now);
    }

    fn handle_left(&mut self, now: Instant) {
        match self.state.class(button::LEFT) {
            ButtonClass::DoubleClick => {
                self.left_down_at = Some(now);
                self.left_consumed = true;
                self.click("doubleclick", now);
            }
            ButtonClass::Pressed => {
                self.left_down_at = Some(now);
                self.left_consumed = false;
            }
            ButtonClass::Hold => {
                if self.left_consumed {
                    return;
                }
                if self.state.pointer_state() == PointerState::Drag {
                    self.left_consumed = true;
                    return;
                }
                let held = self
                    .left_down_at
                    .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
                if held >= LONG_CLICK_DURATION {
                    self.left_consumed = true;
                    self.click("longclick", now);
                }
            }
            ButtonClass::Click => {
                if !self.left_consumed {
                    self.click("leftclick", now);
                }
                self.left_down_at = None;
                self.left_consumed = false;
            }
            ButtonClass::None => {}
        }
    }
}

impl Session for MouseSession {
    fn start(&mut self, now: Instant) {
        self.link.start(now);
    }

    fn process(&mut self, sample: Option<&ButtonSample>, now: Instant) {
        self.state.update(sample, now);

        if self.state.moved() {
            let (x, y) = self.state.scaled_position();
            self.link.send(&Message::Mouse(MouseMessage::absolute(x, y)), now);
        }

        self.handle_left(now);
        if self.state.class(button::RIGHT) == ButtonClass::Click {
            self.click("rightclick", now);
        }
        if self.state.class(button::MIDDLE) == ButtonClass::Click {
            self.click("middleclick", now);
        }

        match self.state.wheel() {
            w if w > 0 => self.click("wheelup", now),
            w if w < 0 => self.click("wheeldown", now),
            _ => {}
        }

        self.link.keepalive(now);
    }

    fn stop(&mut self, now: Instant) {
        self.link.stop(now);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::RecordingSink;
    use super::*;
    use std::sync::Arc;
    use xbmc_events_core::protocol::{HeloMessage, PacketType};

    const LEFT: u32 = 1 << button::LEFT;
    const RIGHT: u32 = 1 << button::RIGHT;

    fn session() -> (MouseSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let link = SessionLink::new(sink.clone(), HeloMessage::new("Mouse"), Duration::from_secs(45));
        let session = MouseSession::new(link, MouseState::new(1000, 1000), DEFAULT_MOUSE_DEVICE_MAP);
        (session, sink)
    }

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    fn buttons(mask: u32) -> ButtonSample {
        ButtonSample::with_buttons(mask)
    }

    #[test]
    fn test_left_press_release_sends_leftclick_on_release() {
        // Arrange
        let (mut s, sink) = session();
        let t0 = Instant::now();

        // Act – down, held for two polls, up
        s.process(Some(&buttons(LEFT)), t0);
        s.process(Some(&buttons(LEFT)), ms(t0, 20));
        s.process(Some(&buttons(LEFT)), ms(t0, 40));
        let before_release = sink.button_names();
        s.process(Some(&buttons(0)), ms(t0, 60));

        // Assert
        assert!(before_release.is_empty());
        assert_eq!(sink.button_names(), vec!["leftclick"]);
        match &sink.messages()[0] {
            Message::Button(b) => {
                assert_eq!(b.device_map, "LI:mouse");
                assert!(b.flags.no_repeat());
            }
            other => panic!("expected BUTTON, got {other:?}"),
        }
    }

    #[test]
    fn test_second_press_within_window_sends_doubleclick_only() {
        let (mut s, sink) = session();
        let t0 = Instant::now();

        s.process(Some(&buttons(LEFT)), t0);
        s.process(Some(&buttons(0)), ms(t0, 50));
        s.process(Some(&buttons(LEFT)), ms(t0, 200));
        s.process(Some(&buttons(0)), ms(t0, 250));

        assert_eq!(sink.button_names(), vec!["leftclick", "doubleclick"]);
    }

    #[test]
    fn test_second_press_after_window_is_a_new_click() {
        let (mut s, sink) = session();
        let t0 = Instant::now();

        s.process(Some(&buttons(LEFT)), t0);
        s.process(Some(&buttons(0)), ms(t0, 50));
        s.process(Some(&buttons(LEFT)), ms(t0, 600));
        s.process(Some(&buttons(0)), ms(t0, 650));

        assert_eq!(sink.button_names(), vec!["leftclick", "leftclick"]);
    }

    #[test]
    fn test_long_hold_sends_longclick_once() {
        // Arrange
        let (mut s, sink) = session();
        let t0 = Instant::now();

        // Act
        s.process(Some(&buttons(LEFT)), t0);
        s.process(Some(&buttons(LEFT)), ms(t0, 999));
        s.process(Some(&buttons(LEFT)), ms(t0, 1000));
        s.process(Some(&buttons(LEFT)), ms(t0, 1500));
        s.process(Some(&buttons(0)), ms(t0, 1600));

        // Assert
        assert_eq!(sink.button_names(), vec!["longclick"]);
    }

    #[test]
    fn test_drag_suppresses_click() {
        // Arrange
        let (mut s, sink) = session();
        let t0 = Instant::now();
        let drag = ButtonSample {
            buttons: LEFT,
            dx: 10,
            ..ButtonSample::default()
        };

        // Act
        s.process(Some(&buttons(LEFT)), t0);
        s.process(Some(&drag), ms(t0, 20));
        s.process(Some(&buttons(0)), ms(t0, 40));

        // Assert
        assert!(sink.button_names().is_empty());
        assert_eq!(
            sink.types(),
            vec![PacketType::Mouse],
            "the drag itself still moves the pointer"
        );
    }

    #[test]
    fn test_movement_sends_scaled_absolute_position() {
        // Arrange
        let (mut s, sink) = session();
        let t0 = Instant::now();
        let right_by_250 = ButtonSample {
            dx: 250,
            ..ButtonSample::default()
        };

        // Act
        s.process(Some(&right_by_250), t0);
        s.process(Some(&buttons(0)), ms(t0, 20));

        // Assert
        assert_eq!(s.state().position(), (750, 500));
        assert_eq!(
            sink.messages(),
            vec![Message::Mouse(MouseMessage::absolute(
                (750 * 65535 / 1000) as u16,
                (500 * 65535 / 1000) as u16
            ))]
        );
    }

    #[test]
    fn test_right_click_and_wheel() {
        let (mut s, sink) = session();
        let t0 = Instant::now();
        let wheel_up = ButtonSample {
            dz: 1,
            ..ButtonSample::default()
        };
        let wheel_down = ButtonSample {
            dz: -2,
            ..ButtonSample::default()
        };

        s.process(Some(&buttons(RIGHT)), t0);
        s.process(Some(&buttons(0)), ms(t0, 20));
        s.process(Some(&wheel_up), ms(t0, 40));
        s.process(Some(&wheel_down), ms(t0, 60));

        assert_eq!(sink.button_names(), vec!["rightclick", "wheelup", "wheeldown"]);
    }

    #[test]
    fn test_start_stop_bracket_session() {
        let (mut s, sink) = session();
        let t0 = Instant::now();

        s.start(t0);
        s.stop(t0);

        assert_eq!(sink.types(), vec![PacketType::Helo, PacketType::Bye]);
    }
}

//! A device driven by text commands, one per line.
//!
//! Lines are read on a dedicated thread and handed to the poll loop over a
//! channel, so a slow or blocking reader (stdin, a pipe) never stalls it.
//!
//! # Commands
//!
//! ```text
//! down <key>            hold a key or button
//! up <key>              release it
//! press <key>           hold for one poll, release on the next
//! cookie <hid-cookie>   press the Apple Remote key behind a HID cookie string
//! move <dx> <dy> [dz]   relative pointer / wheel movement
//! ir <x> <y>            Wii Remote IR dot position (camera coordinates)
//! wait <ms>             report nothing new for a while
//! # ...                 comment
//! ```
//!
//! At most one key change is applied per poll so that `down` followed by
//! `up` is seen as a press and a release rather than as nothing at all.
//! Motion commands are merged into the current poll.

use std::collections::VecDeque;
use std::io::BufRead;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError, Receiver};
use tracing::{debug, warn};
use xbmc_events_core::keymap::{wii_remote, CookieTable};
use xbmc_events_core::ButtonSample;

use super::{DeviceError, InputDevice};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCommand {
    Down(String),
    Up(String),
    Press(String),
    Cookie(String),
    Move { dx: i32, dy: i32, dz: i32 },
    Ir { x: u16, y: u16 },
    Wait(Duration),
}

impl LineCommand {
    fn changes_keys(&self) -> bool {
        matches!(
            self,
            LineCommand::Down(_) | LineCommand::Up(_) | LineCommand::Press(_) | LineCommand::Cookie(_)
        )
    }
}

/// Parses one input line.  Blank lines and `#` comments yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`DeviceError::Read`] describing the problem for unknown commands
/// or malformed arguments.
pub fn parse_line(line: &str) -> Result<Option<LineCommand>, DeviceError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let bad = || DeviceError::Read(format!("malformed input line: {line:?}"));

    let command = match (verb, args.as_slice()) {
        ("down", [key]) => LineCommand::Down(key.to_string()),
        ("up", [key]) => LineCommand::Up(key.to_string()),
        ("press", [key]) => LineCommand::Press(key.to_string()),
        ("cookie", [cookie]) => LineCommand::Cookie(cookie.to_string()),
        ("move", [dx, dy]) => LineCommand::Move {
            dx: dx.parse().map_err(|_| bad())?,
            dy: dy.parse().map_err(|_| bad())?,
            dz: 0,
        },
        ("move", [dx, dy, dz]) => LineCommand::Move {
            dx: dx.parse().map_err(|_| bad())?,
            dy: dy.parse().map_err(|_| bad())?,
            dz: dz.parse().map_err(|_| bad())?,
        },
        ("ir", [x, y]) => LineCommand::Ir {
            x: x.parse().map_err(|_| bad())?,
            y: y.parse().map_err(|_| bad())?,
        },
        ("wait", [ms]) => LineCommand::Wait(Duration::from_millis(ms.parse().map_err(|_| bad())?)),
        _ => return Err(bad()),
    };
    Ok(Some(command))
}

/// Lines buffered between the reader thread and the poll loop.
const LINE_QUEUE_DEPTH: usize = 64;

/// Line-driven [`InputDevice`].
pub struct LineDevice {
    keys: Vec<String>,
    cookies: Option<CookieTable>,
    source: Option<Box<dyn BufRead + Send>>,
    lines: Option<Receiver<String>>,
    pending: VecDeque<LineCommand>,
    held: u32,
    release_next: u32,
    wait_until: Option<Instant>,
    eof: bool,
}

impl LineDevice {
    /// Creates a device reading from `source`.  `keys` are the key names in
    /// bitmask order; `cookies` selects the HID cookie table (`None` tries
    /// every table).
    pub fn new(
        source: Box<dyn BufRead + Send>,
        keys: Vec<String>,
        cookies: Option<CookieTable>,
    ) -> Self {
        Self {
            keys,
            cookies,
            source: Some(source),
            lines: None,
            pending: VecDeque::new(),
            held: 0,
            release_next: 0,
            wait_until: None,
            eof: false,
        }
    }

    /// Reads from the process's standard input.
    pub fn stdin(keys: Vec<String>, cookies: Option<CookieTable>) -> Self {
        Self::new(Box::new(std::io::BufReader::new(std::io::stdin())), keys, cookies)
    }

    fn key_bit(&self, key: &str) -> Option<u32> {
        let bit = self.keys.iter().position(|k| k == key).map(|i| 1u32 << i);
        if bit.is_none() {
            warn!(key, "unknown key ignored");
        }
        bit
    }

    fn cookie_key(&self, cookie: &str) -> Option<&'static str> {
        let key = match self.cookies {
            Some(table) => table.lookup(cookie),
            None => CookieTable::lookup_any(cookie),
        };
        if key.is_none() {
            warn!(cookie, "unknown HID cookie ignored");
        }
        key.map(|k| k.name())
    }

    /// Takes the next command, from the look-ahead queue or the reader thread.
    fn next_command(&mut self) -> Option<LineCommand> {
        if let Some(command) = self.pending.pop_front() {
            return Some(command);
        }
        let lines = self.lines.as_mut()?;
        loop {
            match lines.try_recv() {
                Ok(line) => match parse_line(&line) {
                    Ok(Some(command)) => return Some(command),
                    Ok(None) => continue,
                    Err(e) => warn!("{e}"),
                },
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.eof = true;
                    return None;
                }
            }
        }
    }

    fn apply(&mut self, command: LineCommand, sample: &mut ButtonSample, now: Instant) {
        match command {
            LineCommand::Down(key) => {
                if let Some(bit) = self.key_bit(&key) {
                    self.held |= bit;
                }
            }
            LineCommand::Up(key) => {
                if let Some(bit) = self.key_bit(&key) {
                    self.held &= !bit;
                }
            }
            LineCommand::Press(key) => {
                if let Some(bit) = self.key_bit(&key) {
                    self.held |= bit;
                    self.release_next |= bit;
                }
            }
            LineCommand::Cookie(cookie) => {
                if let Some(key) = self.cookie_key(&cookie) {
                    self.apply(LineCommand::Press(key.to_string()), sample, now);
                }
            }
            LineCommand::Move { dx, dy, dz } => {
                sample.dx = sample.dx.saturating_add(dx);
                sample.dy = sample.dy.saturating_add(dy);
                sample.dz = sample.dz.saturating_add(dz);
            }
            LineCommand::Ir { x, y } => {
                sample.absolute = Some(wii_remote::ir_to_pointer(x, y));
            }
            LineCommand::Wait(duration) => {
                self.wait_until = Some(now + duration);
            }
        }
    }
}

impl InputDevice for LineDevice {
    fn name(&self) -> &str {
        "line"
    }

    fn initialize(&mut self) -> Result<(), DeviceError> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };
        let (tx, rx) = mpsc::channel(LINE_QUEUE_DEPTH);
        std::thread::Builder::new()
            .name("xbmc-line-input".to_string())
            .spawn(move || {
                for line in source.lines() {
                    match line {
                        Ok(line) => {
                            if tx.blocking_send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "input read failed, closing");
                            break;
                        }
                    }
                }
                debug!("input reader finished");
            })?;
        self.lines = Some(rx);
        Ok(())
    }

    fn poll(&mut self) -> Result<ButtonSample, DeviceError> {
        let now = Instant::now();
        let releasing = self.release_next != 0;
        self.held &= !self.release_next;
        self.release_next = 0;

        let mut sample = ButtonSample::default();
        let waiting = self.wait_until.is_some_and(|until| now < until);
        if !waiting {
            self.wait_until = None;
            // A release counts as this poll's key change.
            let mut keys_changed = releasing;
            while let Some(command) = self.next_command() {
                if command.changes_keys() && keys_changed {
                    self.pending.push_front(command);
                    break;
                }
                keys_changed |= command.changes_keys();
                let is_wait = matches!(command, LineCommand::Wait(_));
                self.apply(command, &mut sample, now);
                if is_wait {
                    break;
                }
            }

            let idle = !keys_changed && !sample.has_motion();
            if self.eof && idle && self.pending.is_empty() && self.wait_until.is_none() {
                if self.held == 0 {
                    return Err(DeviceError::Closed);
                }
                // Input ended with keys still held: release them first.
                self.held = 0;
            }
        }

        sample.buttons = self.held;
        Ok(sample)
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.eof {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn keys() -> Vec<String> {
        ["plus", "minus", "left", "right", "play", "menu"]
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    /// Builds a device and waits until its reader thread has read the whole
    /// script, so each poll sees every line.
    fn device(script: &str) -> LineDevice {
        let mut device = LineDevice::new(Box::new(Cursor::new(script.to_string())), keys(), None);
        device.initialize().expect("init");
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut read = VecDeque::new();
        while !device.eof {
            assert!(Instant::now() < deadline, "reader thread did not finish");
            match device.next_command() {
                Some(command) => read.push_back(command),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        device.pending = read;
        device
    }

    fn masks(device: &mut LineDevice) -> Vec<Option<u32>> {
        (0..4)
            .map(|_| device.poll().ok().map(|sample| sample.buttons))
            .collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("down menu").unwrap(), Some(LineCommand::Down("menu".into())));
        assert_eq!(
            parse_line("move 3 -4").unwrap(),
            Some(LineCommand::Move { dx: 3, dy: -4, dz: 0 })
        );
        assert_eq!(parse_line("ir 10 20").unwrap(), Some(LineCommand::Ir { x: 10, y: 20 }));
        assert_eq!(
            parse_line("wait 250").unwrap(),
            Some(LineCommand::Wait(Duration::from_millis(250)))
        );
        assert_eq!(parse_line("  # comment").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse_line("jump").is_err());
        assert!(parse_line("move 1").is_err());
        assert!(parse_line("move x y").is_err());
        assert!(parse_line("down").is_err());
    }

    #[test]
    fn test_one_key_change_per_poll() {
        // Arrange
        let mut device = device("down menu\nup menu\n");

        // Act
        let first = device.poll().expect("poll");
        let second = device.poll().expect("poll");

        // Assert
        assert_eq!(first.buttons, 1 << 5);
        assert_eq!(second.buttons, 0);
        assert!(matches!(device.poll(), Err(DeviceError::Closed)));
    }

    #[test]
    fn test_press_releases_on_next_poll() {
        let mut device = device("press plus\n");
        assert_eq!(device.poll().expect("poll").buttons, 1);
        assert_eq!(device.poll().expect("poll").buttons, 0);
    }

    #[test]
    fn test_back_to_back_presses_are_separated_by_a_release() {
        // Arrange
        let mut device = device("press menu\npress menu\n");

        // Act
        let polls = masks(&mut device);

        // Assert
        assert_eq!(polls, vec![Some(1 << 5), Some(0), Some(1 << 5), Some(0)]);
        assert!(matches!(device.poll(), Err(DeviceError::Closed)));
    }

    #[test]
    fn test_release_poll_does_not_apply_next_down() {
        let mut device = device("press plus\ndown minus\n");
        assert_eq!(masks(&mut device), vec![Some(1), Some(0), Some(2), Some(0)]);
    }

    #[test]
    fn test_cookie_maps_to_key() {
        // Arrange – Leopard "play"
        let mut device = device("cookie 31_21_19_18_31_21_19_18_\n");

        // Act
        let sample = device.poll().expect("poll");

        // Assert
        assert_eq!(sample.buttons, 1 << 4);
    }

    #[test]
    fn test_motion_is_merged_into_one_poll() {
        let mut device = device("move 1 2\nmove 3 4 -1\ndown left\n");
        let sample = device.poll().expect("poll");
        assert_eq!((sample.dx, sample.dy, sample.dz), (4, 6, -1));
        assert_eq!(sample.buttons, 1 << 2);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut device = device("down eject\npress plus\n");
        // The unknown key still counts as this poll's key change.
        assert_eq!(device.poll().expect("poll").buttons, 0);
        assert_eq!(device.poll().expect("poll").buttons, 1);
    }

    #[test]
    fn test_held_keys_released_at_end_of_input() {
        let mut device = device("down minus\n");
        assert_eq!(device.poll().expect("poll").buttons, 2);
        assert_eq!(device.poll().expect("poll").buttons, 0);
        assert!(matches!(device.poll(), Err(DeviceError::Closed)));
        assert!(device.acquire().is_err());
    }

    #[test]
    fn test_wait_defers_following_lines() {
        // Arrange
        let mut device = device("wait 100\npress plus\n");

        // Act
        let during = device.poll().expect("poll");
        std::thread::sleep(Duration::from_millis(120));
        let after = device.poll().expect("poll");

        // Assert
        assert_eq!(during.buttons, 0);
        assert_eq!(after.buttons, 1);
    }
}

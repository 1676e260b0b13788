//! Input device adapters.
//!
//! A device produces one [`ButtonSample`] per poll: a bitmask of held keys
//! or buttons plus optional relative motion and an absolute IR position.
//! The sessions never talk to a concrete device; they see a
//! [`DeviceMonitor`], which wraps any [`InputDevice`] and applies the
//! failure policy:
//!
//! - a failed poll is reported as "no sample" and the session treats it as
//!   nothing held, no movement,
//! - after `max_failures` consecutive failures the device is flagged
//!   disconnected and the session starts calling [`DeviceMonitor::reacquire`],
//! - [`DeviceError::Closed`] means the input source is gone for good (end of
//!   a scripted input stream) and ends the session.
//!
//! # Sub-modules
//!
//! - **`line`** – a device driven by text commands, one per line (stdin by
//!   default).
//! - **`mock`** – a scripted device for tests.

use thiserror::Error;
use tracing::{debug, info, warn};
use xbmc_events_core::ButtonSample;

pub mod line;
pub mod mock;

/// Consecutive failed polls after which a device is flagged disconnected.
pub const DEFAULT_MAX_FAILURES: u32 = 10;

/// Errors reported by input devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device is not present.
    #[error("input device not found: {0}")]
    NotFound(String),

    /// The device could not be read this poll.
    #[error("input device read failed: {0}")]
    Read(String),

    /// Exclusive access to the device was lost (focus change, unplug).
    #[error("input device access lost")]
    AccessLost,

    /// The input source has ended and will produce nothing more.
    #[error("input source closed")]
    Closed,

    #[error("input device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of raw button/motion samples.
pub trait InputDevice: Send {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Opens the device.  Called once before the first poll.
    fn initialize(&mut self) -> Result<(), DeviceError>;

    /// Reads the state for one polling cycle.
    fn poll(&mut self) -> Result<ButtonSample, DeviceError>;

    /// Regains access to a device after it was lost.
    fn acquire(&mut self) -> Result<(), DeviceError>;
}

/// Wraps a device with the consecutive-failure and reconnect policy.
pub struct DeviceMonitor {
    device: Box<dyn InputDevice>,
    max_failures: u32,
    failures: u32,
    connected: bool,
    closed: bool,
}

impl DeviceMonitor {
    pub fn new(device: Box<dyn InputDevice>, max_failures: u32) -> Self {
        Self {
            device,
            max_failures: max_failures.max(1),
            failures: 0,
            connected: false,
            closed: false,
        }
    }

    /// Initialises the wrapped device.
    ///
    /// # Errors
    ///
    /// Propagates the device's initialisation error; the caller treats it as
    /// fatal at startup.
    pub fn initialize(&mut self) -> Result<(), DeviceError> {
        self.device.initialize()?;
        self.connected = true;
        self.failures = 0;
        info!(device = self.device.name(), "input device initialised");
        Ok(())
    }

    /// Polls the device.  `None` means no usable sample this cycle.
    pub fn poll(&mut self) -> Option<ButtonSample> {
        if self.closed {
            return None;
        }
        match self.device.poll() {
            Ok(sample) => {
                self.failures = 0;
                if !self.connected {
                    info!(device = self.device.name(), "input device back");
                    self.connected = true;
                }
                Some(sample)
            }
            Err(DeviceError::Closed) => {
                info!(device = self.device.name(), "input source closed");
                self.closed = true;
                self.connected = false;
                None
            }
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                debug!(device = self.device.name(), failures = self.failures, error = %e, "poll failed");
                if self.connected && self.failures >= self.max_failures {
                    warn!(
                        device = self.device.name(),
                        failures = self.failures,
                        "input device flagged disconnected"
                    );
                    self.connected = false;
                }
                None
            }
        }
    }

    /// Tries to regain a disconnected device.  Returns the connection flag.
    pub fn reacquire(&mut self) -> bool {
        if self.connected || self.closed {
            return self.connected;
        }
        match self.device.acquire() {
            Ok(()) => {
                info!(device = self.device.name(), "input device reacquired");
                self.connected = true;
                self.failures = 0;
            }
            Err(e) => debug!(device = self.device.name(), error = %e, "reacquire failed"),
        }
        self.connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}

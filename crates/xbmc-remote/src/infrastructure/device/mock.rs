//! Scripted input device for testing.
//!
//! Plays back a fixed list of poll results.  Once the script is exhausted it
//! either keeps returning an empty sample or, when built with
//! [`ScriptedDevice::closing`], reports [`DeviceError::Closed`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use xbmc_events_core::ButtonSample;

use super::{DeviceError, InputDevice};

/// Call counters shared between a [`ScriptedDevice`] and the test that owns it.
#[derive(Debug, Default)]
pub struct DeviceStats {
    pub initialized: AtomicBool,
    pub polls: AtomicUsize,
    pub acquires: AtomicUsize,
}

pub struct ScriptedDevice {
    script: VecDeque<Result<ButtonSample, DeviceError>>,
    close_when_done: bool,
    failing_acquires: usize,
    stats: Arc<DeviceStats>,
}

impl ScriptedDevice {
    /// A device that returns `samples` in order.
    pub fn new(samples: impl IntoIterator<Item = ButtonSample>) -> Self {
        Self::with_script(samples.into_iter().map(Ok).collect())
    }

    /// A device that returns each scripted result in order, errors included.
    pub fn with_script(script: Vec<Result<ButtonSample, DeviceError>>) -> Self {
        Self {
            script: script.into(),
            close_when_done: false,
            failing_acquires: 0,
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// Report [`DeviceError::Closed`] once the script runs out.
    pub fn closing(mut self) -> Self {
        self.close_when_done = true;
        self
    }

    /// Make the first `count` calls to `acquire` fail.
    pub fn failing_acquire(mut self, count: usize) -> Self {
        self.failing_acquires = count;
        self
    }

    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }
}

impl InputDevice for ScriptedDevice {
    fn name(&self) -> &str {
        "scripted"
    }

    fn initialize(&mut self) -> Result<(), DeviceError> {
        self.stats.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn poll(&mut self) -> Result<ButtonSample, DeviceError> {
        self.stats.polls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(result) => result,
            None if self.close_when_done => Err(DeviceError::Closed),
            None => Ok(ButtonSample::default()),
        }
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        self.stats.acquires.fetch_add(1, Ordering::SeqCst);
        if self.failing_acquires > 0 {
            self.failing_acquires -= 1;
            return Err(DeviceError::AccessLost);
        }
        Ok(())
    }
}

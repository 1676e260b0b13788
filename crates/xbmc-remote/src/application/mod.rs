//! Application layer: the event-client sessions.
//!
//! # What is a session? (for beginners)
//!
//! A session is one conversation with the EventServer:
//!
//! 1. **HELO** announces the client (name and optional icon).
//! 2. Every poll the input device is read, the raw sample is classified and
//!    the result is turned into BUTTON or MOUSE packets.
//! 3. If nothing was sent for `ping_interval`, a **PING** keeps the client
//!    from being expired by the receiver.
//! 4. **BYE** ends the conversation on shutdown.
//!
//! Two sessions exist:
//!
//! - **`remote_session`** – remote-control keys go through the
//!   [`CommandRouter`](xbmc_events_core::CommandRouter), including the
//!   chorded universal mode.  A Wii IR position drives the pointer.
//! - **`mouse_session`** – a pointer: clicks, double clicks, long clicks,
//!   wheel steps and absolute position.
//!
//! Both share [`SessionLink`] for the HELO/PING/BYE bookkeeping and are
//! driven by the same [`drive`] loop.

pub mod mouse_session;
pub mod remote_session;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use xbmc_events_core::protocol::{ButtonMessage, HeloMessage, LogLevel, LogMessage, NotificationMessage};
use xbmc_events_core::{ButtonSample, Message};

use crate::infrastructure::device::DeviceMonitor;
use crate::infrastructure::network::PacketSink;

/// Default silence after which a PING is sent.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(45);

// ── Session link ──────────────────────────────────────────────────────────────

/// The connection-level half of a session: HELO, keepalive and BYE.
///
/// Send failures are logged and otherwise ignored; UDP gives no delivery
/// guarantee anyway and the next poll will produce fresh packets.
pub struct SessionLink {
    sink: Arc<dyn PacketSink>,
    helo: HeloMessage,
    ping_interval: Duration,
    last_sent: Option<Instant>,
}

impl SessionLink {
    pub fn new(sink: Arc<dyn PacketSink>, helo: HeloMessage, ping_interval: Duration) -> Self {
        Self {
            sink,
            helo,
            ping_interval,
            last_sent: None,
        }
    }

    /// Sends HELO.
    pub fn start(&mut self, now: Instant) {
        info!(device = %self.helo.device_name, "sending HELO");
        let helo = Message::Helo(self.helo.clone());
        self.send(&helo, now);
    }

    /// Sends one message.  Returns `false` if the transport reported an error.
    pub fn send(&mut self, message: &Message, now: Instant) -> bool {
        // A failed send still counts as traffic for the keepalive clock.
        self.last_sent = Some(now);
        match self.sink.send_message(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(packet = ?message.packet_type(), "send failed: {e}");
                false
            }
        }
    }

    pub fn send_button(&mut self, button: ButtonMessage, now: Instant) -> bool {
        debug!(name = %button.name, code = button.code, flags = button.flags.0, "BUTTON");
        self.send(&Message::Button(button), now)
    }

    /// Pops up a notification on the media center, carrying the HELO icon.
    pub fn notify(&mut self, title: &str, message: &str, now: Instant) -> bool {
        let notification = NotificationMessage {
            title: title.to_string(),
            message: message.to_string(),
            icon_type: self.helo.icon_type,
            icon_data: self.helo.icon_data.clone(),
        };
        self.send(&Message::Notification(notification), now)
    }

    /// Writes a line to the media center's log.
    pub fn log(&mut self, level: LogLevel, message: &str, now: Instant) -> bool {
        let log = LogMessage {
            level,
            message: message.to_string(),
        };
        self.send(&Message::Log(log), now)
    }

    /// Sends PING if the link has been quiet for `ping_interval`.
    ///
    /// Does nothing before [`start`](Self::start).
    pub fn keepalive(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.saturating_duration_since(last) >= self.ping_interval => {
                debug!("keepalive PING");
                self.send(&Message::Ping, now);
                true
            }
            _ => false,
        }
    }

    /// Sends BYE.
    pub fn stop(&mut self, now: Instant) {
        info!(device = %self.helo.device_name, "sending BYE");
        self.send(&Message::Bye, now);
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }
}

// ── Session trait and loop ────────────────────────────────────────────────────

/// One event-client session.
pub trait Session: Send {
    /// Announces the client.
    fn start(&mut self, now: Instant);

    /// Handles one poll.  `None` means the device produced nothing usable.
    fn process(&mut self, sample: Option<&ButtonSample>, now: Instant);

    /// Ends the conversation.
    fn stop(&mut self, now: Instant);
}

/// Requests delivered to a running [`drive`] loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// SIGINT / SIGTERM.
    Shutdown,
    /// SIGHUP: reload the configuration.
    Reload,
}

/// Why [`drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    Reload,
    /// The input source ended.
    DeviceClosed,
}

/// Polls `device` every `poll_interval` and feeds the samples to `session`
/// until a control event arrives or the device closes.
///
/// The loop does not send HELO or BYE; the caller brackets it with
/// [`Session::start`] and [`Session::stop`] so that a reload can re-enter
/// the loop without reconnecting.  A closed control channel counts as
/// [`ControlEvent::Shutdown`].
pub async fn drive(
    session: &mut dyn Session,
    device: &mut DeviceMonitor,
    poll_interval: Duration,
    control: &mut mpsc::Receiver<ControlEvent>,
) -> StopReason {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = control.recv() => {
                return match event {
                    Some(ControlEvent::Reload) => StopReason::Reload,
                    Some(ControlEvent::Shutdown) | None => StopReason::Shutdown,
                };
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                let sample = device.poll();
                if device.is_closed() {
                    // One last "nothing held" poll releases any held key.
                    session.process(None, now);
                    return StopReason::DeviceClosed;
                }
                if !device.is_connected() {
                    device.reacquire();
                }
                session.process(sample.as_ref(), now);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;
    use crate::infrastructure::device::mock::ScriptedDevice;
    use crate::infrastructure::network::{MockPacketSink, TransportError};
    use std::sync::Mutex;
    use xbmc_events_core::protocol::{IconType, PacketType};

    fn link(sink: Arc<dyn PacketSink>, ping: Duration) -> SessionLink {
        SessionLink::new(sink, HeloMessage::new("Test Remote"), ping)
    }

    // ── SessionLink ───────────────────────────────────────────────────────────

    #[test]
    fn test_start_and_stop_send_helo_and_bye() {
        // Arrange
        let sink = Arc::new(RecordingSink::default());
        let mut link = link(sink.clone(), DEFAULT_PING_INTERVAL);
        let t0 = Instant::now();

        // Act
        link.start(t0);
        link.stop(t0);

        // Assert
        assert_eq!(sink.types(), vec![PacketType::Helo, PacketType::Bye]);
        match &sink.messages()[0] {
            Message::Helo(helo) => assert_eq!(helo.device_name, "Test Remote"),
            other => panic!("expected HELO, got {other:?}"),
        }
    }

    #[test]
    fn test_keepalive_waits_for_ping_interval() {
        // Arrange
        let sink = Arc::new(RecordingSink::default());
        let mut link = link(sink.clone(), Duration::from_secs(45));
        let t0 = Instant::now();

        // Act / Assert
        assert!(!link.keepalive(t0), "no PING before HELO");
        link.start(t0);
        assert!(!link.keepalive(t0 + Duration::from_secs(44)));
        assert!(link.keepalive(t0 + Duration::from_secs(45)));
        assert!(!link.keepalive(t0 + Duration::from_secs(46)), "PING resets the clock");
        assert_eq!(sink.types(), vec![PacketType::Helo, PacketType::Ping]);
    }

    #[test]
    fn test_traffic_postpones_keepalive() {
        let sink = Arc::new(RecordingSink::default());
        let mut link = link(sink.clone(), Duration::from_secs(10));
        let t0 = Instant::now();
        link.start(t0);

        link.send_button(ButtonMessage::named("select", "R1", 0, 0), t0 + Duration::from_secs(8));

        assert!(!link.keepalive(t0 + Duration::from_secs(12)));
        assert!(link.keepalive(t0 + Duration::from_secs(18)));
    }

    #[test]
    fn test_notify_carries_helo_icon() {
        // Arrange
        let sink = Arc::new(RecordingSink::default());
        let helo = HeloMessage {
            icon_type: IconType::Png,
            icon_data: vec![0x89, b'P', b'N', b'G'],
            ..HeloMessage::new("Test Remote")
        };
        let mut link = SessionLink::new(sink.clone(), helo, DEFAULT_PING_INTERVAL);

        // Act
        let ok = link.notify("Connected", "Apple Remote ready", Instant::now());

        // Assert
        assert!(ok);
        assert_eq!(
            sink.messages(),
            vec![Message::Notification(NotificationMessage {
                title: "Connected".to_string(),
                message: "Apple Remote ready".to_string(),
                icon_type: IconType::Png,
                icon_data: vec![0x89, b'P', b'N', b'G'],
            })]
        );
    }

    #[test]
    fn test_log_counts_as_traffic() {
        let sink = Arc::new(RecordingSink::default());
        let mut link = link(sink.clone(), Duration::from_secs(10));
        let t0 = Instant::now();
        link.start(t0);

        link.log(LogLevel::Warning, "battery low", t0 + Duration::from_secs(8));

        assert_eq!(
            sink.messages().last(),
            Some(&Message::Log(LogMessage {
                level: LogLevel::Warning,
                message: "battery low".to_string(),
            }))
        );
        assert!(!link.keepalive(t0 + Duration::from_secs(12)));
    }

    #[test]
    fn test_send_failure_is_reported_not_raised() {
        // Arrange
        let mut mock = MockPacketSink::new();
        mock.expect_send_message()
            .times(2)
            .returning(|_| Err(TransportError::PartialSend { failed: 1, total: 1 }));
        let mut link = link(Arc::new(mock), DEFAULT_PING_INTERVAL);
        let t0 = Instant::now();

        // Act
        link.start(t0);
        let ok = link.send(&Message::Ping, t0);

        // Assert
        assert!(!ok);
        assert_eq!(link.last_sent(), Some(t0));
    }

    // ── drive ─────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct CountingSession {
        samples: Mutex<Vec<Option<ButtonSample>>>,
    }

    impl Session for CountingSession {
        fn start(&mut self, _now: Instant) {}
        fn process(&mut self, sample: Option<&ButtonSample>, _now: Instant) {
            self.samples.lock().unwrap().push(sample.copied());
        }
        fn stop(&mut self, _now: Instant) {}
    }

    #[tokio::test]
    async fn test_drive_runs_until_device_closes() {
        // Arrange
        let device = ScriptedDevice::new([ButtonSample::with_buttons(1), ButtonSample::default()]).closing();
        let mut monitor = DeviceMonitor::new(Box::new(device), 10);
        monitor.initialize().expect("init");
        let mut session = CountingSession::default();
        let (_tx, mut rx) = mpsc::channel(4);

        // Act
        let reason = drive(&mut session, &mut monitor, Duration::from_millis(1), &mut rx).await;

        // Assert
        assert_eq!(reason, StopReason::DeviceClosed);
        let samples = session.samples.lock().unwrap().clone();
        assert_eq!(
            samples,
            vec![Some(ButtonSample::with_buttons(1)), Some(ButtonSample::default()), None]
        );
    }

    #[tokio::test]
    async fn test_drive_stops_on_control_event() {
        // Arrange
        let mut monitor = DeviceMonitor::new(Box::new(ScriptedDevice::new(Vec::new())), 10);
        monitor.initialize().expect("init");
        let mut session = CountingSession::default();
        let (tx, mut rx) = mpsc::channel(4);

        // Act
        tx.send(ControlEvent::Reload).await.expect("send reload");
        let first = drive(&mut session, &mut monitor, Duration::from_millis(5), &mut rx).await;
        drop(tx);
        let second = drive(&mut session, &mut monitor, Duration::from_millis(5), &mut rx).await;

        // Assert
        assert_eq!(first, StopReason::Reload);
        assert_eq!(second, StopReason::Shutdown, "closed channel means shutdown");
    }

    #[tokio::test]
    async fn test_drive_reacquires_disconnected_device() {
        // Arrange – two failures trip a threshold of 2, then the script ends
        let script = vec![
            Err(crate::infrastructure::device::DeviceError::AccessLost),
            Err(crate::infrastructure::device::DeviceError::AccessLost),
            Ok(ButtonSample::default()),
        ];
        let device = ScriptedDevice::with_script(script).closing();
        let stats = device.stats();
        let mut monitor = DeviceMonitor::new(Box::new(device), 2);
        monitor.initialize().expect("init");
        let mut session = CountingSession::default();
        let (_tx, mut rx) = mpsc::channel(4);

        // Act
        let reason = drive(&mut session, &mut monitor, Duration::from_millis(1), &mut rx).await;

        // Assert
        assert_eq!(reason, StopReason::DeviceClosed);
        assert_eq!(stats.acquires.load(std::sync::atomic::Ordering::SeqCst), 1);
        let samples = session.samples.lock().unwrap().clone();
        assert_eq!(samples[..2], [None, None]);
    }
}

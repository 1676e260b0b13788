//! Remote-control session.
//!
//! Each poll the key bitmask is classified by [`ButtonEventState`]; fresh
//! presses go to [`CommandRouter::key_down`], releases to
//! [`CommandRouter::key_up`], and whatever packets the router returns are
//! sent.  The router's chord timer is checked at the start of every poll,
//! so a pending chord is flushed on the poll loop's own thread.
//!
//! An absolute position in the sample (Wii IR camera) is forwarded as an
//! absolute MOUSE packet whenever it changes.

use std::time::Instant;

use tracing::debug;
use xbmc_events_core::keymap::RemoteKind;
use xbmc_events_core::protocol::{ButtonMessage, MouseMessage};
use xbmc_events_core::{ButtonClass, ButtonEventState, ButtonSample, CommandRouter, Message};

use super::{Session, SessionLink};

pub struct RemoteSession {
    link: SessionLink,
    router: CommandRouter,
    buttons: ButtonEventState,
    keys: Vec<String>,
    last_pointer: Option<(u16, u16)>,
}

impl RemoteSession {
    /// A session for one of the built-in remotes.
    pub fn new(link: SessionLink, kind: RemoteKind, router: CommandRouter) -> Self {
        Self::with_keys(link, kind.key_names(), router)
    }

    /// A session whose bit `i` is the key named `keys[i]`.
    pub fn with_keys(link: SessionLink, keys: &[&str], router: CommandRouter) -> Self {
        Self {
            link,
            router,
            buttons: ButtonEventState::new(keys.len()),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            last_pointer: None,
        }
    }

    /// Replaces the router, e.g. after a configuration reload.  A pending
    /// chord on the old router is dropped.
    pub fn set_router(&mut self, router: CommandRouter) {
        self.router = router;
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    fn send_all(link: &mut SessionLink, packets: Vec<ButtonMessage>, now: Instant) {
        for packet in packets {
            link.send_button(packet, now);
        }
    }
}

impl Session for RemoteSession {
    fn start(&mut self, now: Instant) {
        self.link.start(now);
    }

    fn process(&mut self, sample: Option<&ButtonSample>, now: Instant) {
        let expired = self.router.poll_timer(now);
        Self::send_all(&mut self.link, expired, now);

        let mask = sample.map_or(0, |s| s.buttons);
        let classes = self.buttons.update(mask, now).to_vec();

        // Releases before presses: key_up clears the pending release that
        // key_down may set.
        for (key, class) in self.keys.iter().zip(&classes) {
            if *class == ButtonClass::Click {
                if let Some(release) = self.router.key_up(key) {
                    self.link.send_button(release, now);
                }
            }
        }
        for (key, class) in self.keys.iter().zip(&classes) {
            if class.is_press() {
                debug!(key = %key, ?class, "key down");
                let packets = self.router.key_down(key, now);
                Self::send_all(&mut self.link, packets, now);
            }
        }

        if let Some(position) = sample.and_then(|s| s.absolute) {
            if self.last_pointer != Some(position) {
                self.last_pointer = Some(position);
                let (x, y) = position;
                self.link.send(&Message::Mouse(MouseMessage::absolute(x, y)), now);
            }
        }

        self.link.keepalive(now);
    }

    fn stop(&mut self, now: Instant) {
        // A chord still inside its window is dispatched as if it had expired.
        if let Some(deadline) = self.router.next_deadline() {
            let flushed = self.router.poll_timer(deadline.max(now));
            Self::send_all(&mut self.link, flushed, now);
        }
        // A repeating command still held would keep repeating on the
        // receiver after the client is gone.
        if let Some(release) = self.router.key_up("") {
            self.link.send_button(release, now);
        }
        self.router.reset();
        self.link.stop(now);
    }
}

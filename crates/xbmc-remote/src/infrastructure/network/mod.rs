//! UDP transport to the EventServer.
//!
//! The EventServer protocol is fire-and-forget: every logical message is
//! encoded into one or more datagrams (see
//! [`encode_message`](xbmc_events_core::encode_message)) and each datagram is
//! sent with a single `send_to`.  There is no connection, no acknowledgement
//! and no retry.
//!
//! # Address resolution
//!
//! The target host is resolved once when the transport is created.  An empty
//! host, or a host that fails to resolve, falls back to the wildcard address
//! `0.0.0.0` with a warning instead of aborting.  On most systems datagrams
//! sent to the wildcard address reach the local machine.
//!
//! # Partial sends
//!
//! If any fragment of a multi-fragment message is not transmitted in full
//! the remaining fragments are still sent, and the whole send is reported as
//! [`TransportError::PartialSend`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use thiserror::Error;
use tracing::{debug, trace, warn};
use xbmc_events_core::{encode_message, Message};

/// Errors produced by the UDP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local UDP socket could not be created.
    #[error("failed to create UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    /// One or more fragments were not transmitted in full.
    #[error("{failed} of {total} fragment(s) were not sent in full")]
    PartialSend { failed: usize, total: usize },
}

/// Anything that can deliver EventServer messages.
///
/// The production implementation is [`UdpTransport`]; tests substitute a
/// recording double.
#[cfg_attr(test, mockall::automock)]
pub trait PacketSink: Send + Sync {
    /// Encodes `msg` and sends every resulting fragment in sequence order.
    fn send_message(&self, msg: &Message) -> Result<(), TransportError>;
}

/// Resolves `host:port`, falling back to `0.0.0.0:port` when `host` is empty
/// or does not resolve.  IPv4 results are preferred.
pub fn resolve_address(host: &str, port: u16) -> SocketAddr {
    let wildcard = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let host = host.trim();
    if host.is_empty() {
        return wildcard;
    }

    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
                .unwrap_or_else(|| {
                    warn!(host, "host resolved to no addresses, using wildcard address");
                    wildcard
                })
        }
        Err(e) => {
            warn!(host, error = %e, "could not resolve host, using wildcard address");
            wildcard
        }
    }
}

/// Sends EventServer datagrams from an ephemeral local UDP port.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Resolves `host:port` and binds an ephemeral local socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Socket`] if no local socket can be bound.
    /// Resolution failures are not errors (see [`resolve_address`]).
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        Self::with_target(resolve_address(host, port))
    }

    /// Binds an ephemeral local socket that sends to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Socket`] if the socket cannot be bound.
    pub fn with_target(target: SocketAddr) -> Result<Self, TransportError> {
        let bind: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).map_err(TransportError::Socket)?;
        debug!(%target, local = ?socket.local_addr().ok(), "UDP transport ready");
        Ok(Self { socket, target })
    }

    /// Address datagrams are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Sends already-framed datagrams in order, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PartialSend`] if any datagram was not sent
    /// in full.
    pub fn send_datagrams(&self, datagrams: &[Vec<u8>]) -> Result<(), TransportError> {
        let total = datagrams.len();
        let mut failed = 0;
        for (index, datagram) in datagrams.iter().enumerate() {
            match self.socket.send_to(datagram, self.target) {
                Ok(sent) if sent == datagram.len() => {
                    trace!(fragment = index + 1, total, bytes = sent, "datagram sent");
                }
                Ok(sent) => {
                    warn!(fragment = index + 1, total, sent, expected = datagram.len(), "short send");
                    failed += 1;
                }
                Err(e) => {
                    warn!(fragment = index + 1, total, error = %e, "send failed");
                    failed += 1;
                }
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(TransportError::PartialSend { failed, total })
        }
    }
}

impl PacketSink for UdpTransport {
    fn send_message(&self, msg: &Message) -> Result<(), TransportError> {
        self.send_datagrams(&encode_message(msg))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

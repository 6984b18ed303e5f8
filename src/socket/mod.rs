//! Echo socket abstraction used by the prober
//!
//! An [`EchoSocket`] sends exactly one TTL-scoped ICMP echo request and waits
//! for the reply that belongs to it. Everything above this layer (retries,
//! classification, hop tables) only sees [`EchoReply`] values.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub mod factory;
pub mod icmp;
pub mod utils;

pub use factory::create_echo_socket;
pub use icmp::IcmpEchoSocket;

/// Socket mode (affects permissions required)
///
/// - **Raw**: sees every ICMP message, requires root or `CAP_NET_RAW`
/// - **Dgram**: ICMP datagram ("ping") sockets. On Linux this needs
///   `net.ipv4.ping_group_range` and only echo replies are delivered, so
///   intermediate routers show up as timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketMode {
    /// Raw ICMP socket
    Raw,
    /// Datagram ICMP socket
    Dgram,
}

impl SocketMode {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            SocketMode::Raw => "Raw",
            SocketMode::Dgram => "Datagram",
        }
    }
}

/// One echo request to send
#[derive(Debug, Clone, Copy)]
pub struct EchoProbe {
    /// Time-to-live for the outgoing packet
    pub ttl: u8,
    /// ICMP sequence number, unique within the process
    pub sequence: u16,
    /// How long to wait for a matching reply
    pub timeout: Duration,
}

/// Kind of ICMP message that answered a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Echo reply from the probed host itself
    EchoReply,
    /// Time exceeded from a router on the path
    TimeExceeded,
}

/// A reply matched to the probe that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReply {
    /// Address that sent the reply
    pub from_addr: IpAddr,
    /// What kind of reply it was
    pub kind: ReplyKind,
    /// Round-trip time
    pub rtt: Duration,
}

/// Capability to send a single ICMP echo and wait for its answer
///
/// Implementations must be safe to share between concurrently running
/// probes. `Ok(None)` means the timeout elapsed with no matching reply.
#[async_trait]
pub trait EchoSocket: Send + Sync {
    /// Get the socket mode this implementation uses
    fn mode(&self) -> SocketMode;

    /// Send one echo request to `dest` and wait for the matching reply
    async fn send_echo(
        &self,
        dest: IpAddr,
        probe: EchoProbe,
        payload: &[u8],
    ) -> Result<Option<EchoReply>>;
}

//! Single-TTL echo probing
//!
//! A [`Probe`] sends one TTL-scoped echo and classifies the answer. It never
//! fails: transport errors are reported as [`ProbeStatus::TimedOut`] so the
//! hop discovery engine only ever deals with outcomes.

use crate::socket::{EchoProbe, EchoSocket, ReplyKind};
use crate::trace_time;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Size of the randomized ICMP echo payload
pub const PAYLOAD_SIZE: usize = 32;

/// Address recorded for hops that never answered
pub const SENTINEL_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Shortest timeout a retry is allowed to shrink to
const MIN_RETRY_TIMEOUT: Duration = Duration::from_millis(1);

static NEXT_SEQUENCE: AtomicU16 = AtomicU16::new(1);

/// Allocate a process-unique ICMP sequence number
fn next_sequence() -> u16 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// How a single probe ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// The probed host itself replied
    Reached,
    /// A router on the path replied with time exceeded
    IntermediateHop,
    /// Nothing answered before the deadline
    TimedOut,
}

/// Result of probing one TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Time-to-live the probe was sent with
    pub ttl: u8,
    /// Responding address, or [`SENTINEL_ADDR`] on timeout
    pub addr: IpAddr,
    /// Classification of the reply
    pub status: ProbeStatus,
    /// Round-trip time of the answering probe
    pub rtt: Option<Duration>,
}

impl ProbeOutcome {
    /// Create a timed-out outcome for `ttl`
    pub fn timed_out(ttl: u8) -> Self {
        Self {
            ttl,
            addr: SENTINEL_ADDR,
            status: ProbeStatus::TimedOut,
            rtt: None,
        }
    }

    /// Create an intermediate hop outcome
    pub fn intermediate(ttl: u8, addr: IpAddr) -> Self {
        Self {
            ttl,
            addr,
            status: ProbeStatus::IntermediateHop,
            rtt: None,
        }
    }

    /// Create a destination-reached outcome
    pub fn reached(ttl: u8, addr: IpAddr) -> Self {
        Self {
            ttl,
            addr,
            status: ProbeStatus::Reached,
            rtt: None,
        }
    }

    /// Check if the probe got no answer
    pub fn is_timeout(&self) -> bool {
        self.status == ProbeStatus::TimedOut
    }
}

/// Something that can probe one TTL towards a host
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe `host` with the given TTL, waiting at most `timeout` per attempt
    async fn probe(&self, host: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome;
}

/// Retry behaviour for timed-out probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Whether timed-out probes are retried at all
    pub enabled: bool,
    /// Maximum number of additional attempts
    pub count: u32,
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            count: 0,
        }
    }

    /// Timeout of every retry: half the initial timeout
    pub fn retry_timeout(initial: Duration) -> Duration {
        (initial / 2).max(MIN_RETRY_TIMEOUT)
    }
}

/// ICMP echo prober with an optional half-timeout retry loop
pub struct EchoProber {
    socket: Arc<dyn EchoSocket>,
    payload: [u8; PAYLOAD_SIZE],
    retry: RetryPolicy,
    verbose: u8,
}

impl EchoProber {
    /// Create a prober with a freshly randomized payload
    pub fn new(socket: Arc<dyn EchoSocket>, retry: RetryPolicy, verbose: u8) -> Self {
        Self {
            socket,
            payload: rand::random(),
            retry,
            verbose,
        }
    }

    async fn attempt(&self, host: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome {
        let probe = EchoProbe {
            ttl,
            sequence: next_sequence(),
            timeout,
        };

        match self.socket.send_echo(host, probe, &self.payload).await {
            Ok(Some(reply)) => {
                let status = match reply.kind {
                    ReplyKind::TimeExceeded => ProbeStatus::IntermediateHop,
                    ReplyKind::EchoReply => ProbeStatus::Reached,
                };
                ProbeOutcome {
                    ttl,
                    addr: reply.from_addr,
                    status,
                    rtt: Some(reply.rtt),
                }
            }
            Ok(None) => ProbeOutcome::timed_out(ttl),
            Err(e) => {
                trace_time!(self.verbose, "Probe ttl={} to {} failed: {:#}", ttl, host, e);
                ProbeOutcome::timed_out(ttl)
            }
        }
    }
}

#[async_trait]
impl Probe for EchoProber {
    async fn probe(&self, host: IpAddr, ttl: u8, timeout: Duration) -> ProbeOutcome {
        let mut outcome = self.attempt(host, ttl, timeout).await;

        if self.retry.enabled {
            for attempt in 1..=self.retry.count {
                if !outcome.is_timeout() {
                    break;
                }
                let retry_timeout = RetryPolicy::retry_timeout(timeout);
                trace_time!(
                    self.verbose,
                    "Retrying ttl={} (attempt {}) with {:?} timeout",
                    ttl,
                    attempt,
                    retry_timeout
                );
                outcome = self.attempt(host, ttl, retry_timeout).await;
            }
        }

        outcome
    }
}

//! IPv4 ICMP echo socket using one socket per probe
//!
//! Every probe gets its own socket so the TTL can be set independently while
//! all TTLs are in flight at once. Raw sockets see every ICMP message on the
//! host, so replies are matched on identifier and sequence number.

use super::{EchoProbe, EchoReply, EchoSocket, ReplyKind, SocketMode};
use crate::trace_time;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use socket2::{Domain, Protocol, Socket as Socket2, Type};
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// ICMP error header length in bytes
const ICMP_ERROR_HEADER_LEN_BYTES: usize = 8;
/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;
/// Bytes of the original ICMP header quoted back in a time exceeded message
const QUOTED_ICMP_LEN_BYTES: usize = 8;
/// Receive buffer size, one Ethernet MTU
const RECV_BUFFER_LEN: usize = 1500;
/// Delay between non-blocking receive attempts
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Open an IPv4 ICMP socket of the given mode
pub(crate) fn open_icmp_socket(mode: SocketMode) -> std::io::Result<Socket2> {
    let socket_type = match mode {
        SocketMode::Raw => Type::RAW,
        SocketMode::Dgram => Type::DGRAM,
    };
    Socket2::new(Domain::IPV4, socket_type, Some(Protocol::ICMPV4))
}

/// Build an ICMP echo request packet with a valid checksum
pub fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let mut icmp_buf = vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut echo_req_packet = MutableEchoRequestPacket::new(&mut icmp_buf)
        .ok_or_else(|| anyhow!("Failed to create ICMP packet"))?;

    echo_req_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_req_packet.set_icmp_code(IcmpCode(0));
    echo_req_packet.set_identifier(identifier);
    echo_req_packet.set_sequence_number(sequence);
    echo_req_packet.set_payload(payload);

    let checksum = pnet_checksum(echo_req_packet.packet(), 1);
    echo_req_packet.set_checksum(checksum);

    Ok(icmp_buf)
}

/// Split a received datagram into its sender and ICMP message
///
/// Raw sockets (and macOS datagram sockets) deliver the IPv4 header, Linux
/// datagram sockets deliver the bare ICMP message. `fallback` is used as the
/// sender when there is no header to read it from.
fn split_ip_header(packet: &[u8], fallback: IpAddr) -> Option<(IpAddr, &[u8])> {
    if packet.len() >= IPV4_HEADER_MIN_LEN_BYTES && packet[0] >> 4 == 4 {
        let ipv4 = Ipv4Packet::new(packet)?;
        let header_len = usize::from(ipv4.get_header_length()) * 4;
        if header_len < IPV4_HEADER_MIN_LEN_BYTES || header_len > packet.len() {
            return None;
        }
        Some((IpAddr::V4(ipv4.get_source()), &packet[header_len..]))
    } else {
        Some((fallback, packet))
    }
}

/// Match a received datagram against the probe that is waiting for it
///
/// `identifier` is `None` when the kernel rewrites the ICMP identifier
/// (Linux datagram sockets); the sequence number alone is then checked.
pub fn parse_reply(
    packet: &[u8],
    dest: IpAddr,
    identifier: Option<u16>,
    sequence: u16,
) -> Option<(IpAddr, ReplyKind)> {
    let (from_addr, icmp_data) = split_ip_header(packet, dest)?;
    let icmp_packet = IcmpPacket::new(icmp_data)?;
    let id_matches = |id: u16| identifier.is_none_or(|expected| expected == id);

    match icmp_packet.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let echo_reply_pkt = EchoReplyPacket::new(icmp_data)?;
            if id_matches(echo_reply_pkt.get_identifier())
                && echo_reply_pkt.get_sequence_number() == sequence
            {
                return Some((from_addr, ReplyKind::EchoReply));
            }
        }
        IcmpTypes::TimeExceeded => {
            let original_datagram_bytes = icmp_data.get(ICMP_ERROR_HEADER_LEN_BYTES..)?;
            if original_datagram_bytes.len() < IPV4_HEADER_MIN_LEN_BYTES {
                return None;
            }
            let inner_ip_packet = Ipv4Packet::new(original_datagram_bytes)?;
            let inner_header_len = usize::from(inner_ip_packet.get_header_length()) * 4;
            let original_icmp_bytes = original_datagram_bytes.get(inner_header_len..)?;
            if original_icmp_bytes.len() < QUOTED_ICMP_LEN_BYTES {
                return None;
            }

            let original_type = original_icmp_bytes[0];
            let original_id = u16::from_be_bytes([original_icmp_bytes[4], original_icmp_bytes[5]]);
            let original_seq = u16::from_be_bytes([original_icmp_bytes[6], original_icmp_bytes[7]]);

            if original_type == IcmpTypes::EchoRequest.0
                && id_matches(original_id)
                && original_seq == sequence
            {
                return Some((from_addr, ReplyKind::TimeExceeded));
            }
        }
        _ => {}
    }

    None
}

/// ICMP echo socket that opens a fresh OS socket for every probe
pub struct IcmpEchoSocket {
    mode: SocketMode,
    icmp_identifier: u16,
    verbose: u8,
}

impl IcmpEchoSocket {
    /// Create an echo socket of the given mode
    pub fn new(mode: SocketMode, verbose: u8) -> Self {
        Self {
            mode,
            icmp_identifier: std::process::id() as u16,
            verbose,
        }
    }

    fn expected_identifier(&self) -> Option<u16> {
        match self.mode {
            SocketMode::Raw => Some(self.icmp_identifier),
            SocketMode::Dgram => None,
        }
    }

    fn open_probe_socket(&self, ttl: u8) -> Result<Socket2> {
        let socket = open_icmp_socket(self.mode).context("Failed to create ICMP socket")?;
        socket
            .set_ttl_v4(u32::from(ttl))
            .context("Failed to set TTL")?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }
}

#[async_trait]
impl EchoSocket for IcmpEchoSocket {
    fn mode(&self) -> SocketMode {
        self.mode
    }

    async fn send_echo(
        &self,
        dest: IpAddr,
        probe: EchoProbe,
        payload: &[u8],
    ) -> Result<Option<EchoReply>> {
        if dest.is_ipv6() {
            bail!("Only IPv4 is supported");
        }

        let socket = self.open_probe_socket(probe.ttl)?;
        let packet = build_echo_request(self.icmp_identifier, probe.sequence, payload)?;

        let sent_at = Instant::now();
        let dest_addr = SocketAddr::new(dest, 0);
        socket
            .send_to(&packet, &dest_addr.into())
            .context("Failed to send ICMP packet")?;

        trace_time!(
            self.verbose,
            "Sent ICMP echo seq={} ttl={} to {}",
            probe.sequence,
            probe.ttl,
            dest
        );

        let deadline = sent_at + probe.timeout;
        let identifier = self.expected_identifier();
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                trace_time!(self.verbose, "Timeout waiting for seq={}", probe.sequence);
                return Ok(None);
            }

            let received = tokio::time::timeout(remaining, async {
                loop {
                    match (&socket).read(&mut buf) {
                        Ok(size) => return Ok(size),
                        Err(e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::Interrupted =>
                        {
                            tokio::time::sleep(RECV_POLL_INTERVAL).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
            })
            .await;

            match received {
                Err(_) => {
                    trace_time!(self.verbose, "Timeout waiting for seq={}", probe.sequence);
                    return Ok(None);
                }
                Ok(Err(e)) => return Err(e).context("Failed to receive ICMP packet"),
                Ok(Ok(size)) => {
                    if let Some((from_addr, kind)) =
                        parse_reply(&buf[..size], dest, identifier, probe.sequence)
                    {
                        let rtt = sent_at.elapsed();
                        trace_time!(
                            self.verbose,
                            "Matched {:?} for seq={} from {} rtt={:?}",
                            kind,
                            probe.sequence,
                            from_addr,
                            rtt
                        );
                        return Ok(Some(EchoReply {
                            from_addr,
                            kind,
                            rtt,
                        }));
                    }
                }
            }
        }
    }
}

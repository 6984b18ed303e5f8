//! Factory for creating echo sockets with automatic fallback

use super::icmp::{open_icmp_socket, IcmpEchoSocket};
use super::{EchoSocket, SocketMode};
use crate::trace_time;
use crate::traceroute::TraceError;

// Common POSIX error codes
const EPERM: i32 = 1; // Operation not permitted
const EACCES: i32 = 13; // Permission denied

fn is_permission_error(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::PermissionDenied
        || matches!(err.raw_os_error(), Some(EPERM) | Some(EACCES))
}

/// Create an echo socket, trying raw ICMP first and datagram ICMP second
///
/// A user-specified mode is the only one tried. The probe sockets themselves
/// are opened per probe; this only checks that the chosen mode is usable so
/// a missing privilege is reported up front instead of as a path of timeouts.
pub fn create_echo_socket(
    preferred_mode: Option<SocketMode>,
    verbose: u8,
) -> Result<Box<dyn EchoSocket>, TraceError> {
    let socket_modes = match preferred_mode {
        Some(mode) => vec![mode],
        None => vec![SocketMode::Raw, SocketMode::Dgram],
    };

    let mut permission_denied = false;
    let mut last_error = None;

    for mode in socket_modes {
        match open_icmp_socket(mode) {
            Ok(_) => {
                trace_time!(verbose, "Using {} ICMP sockets", mode.description());
                return Ok(Box::new(IcmpEchoSocket::new(mode, verbose)));
            }
            Err(e) => {
                trace_time!(
                    verbose,
                    "{} ICMP socket unavailable: {}",
                    mode.description(),
                    e
                );
                permission_denied |= is_permission_error(&e);
                last_error = Some(e);
            }
        }
    }

    if permission_denied {
        return Err(TraceError::InsufficientPermissions {
            required: "root or CAP_NET_RAW for raw ICMP sockets".to_string(),
            suggestion: if cfg!(target_os = "linux") {
                "Run with sudo, or allow ICMP datagram sockets with \
                 `sysctl -w net.ipv4.ping_group_range=\"0 2147483647\"`"
                    .to_string()
            } else {
                "Run with sudo".to_string()
            },
        });
    }

    Err(TraceError::SocketError(
        last_error.map_or_else(|| "no socket mode available".to_string(), |e| e.to_string()),
    ))
}

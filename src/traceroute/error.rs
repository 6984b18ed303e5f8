//! Error types for trace operations

use thiserror::Error;

/// Errors that stop a trace before any hop is probed
///
/// Once probing has started nothing is reported through this type: probe
/// failures become timeouts and lookup failures become empty geo fields.
#[derive(Debug, Error)]
pub enum TraceError {
    /// No ICMP socket could be created due to missing privileges
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Description of required permissions (e.g., "root or CAP_NET_RAW")
        required: String,
        /// Suggested remedy (e.g., "Run with sudo")
        suggestion: String,
    },

    /// Socket creation failed for other reasons
    #[error("Failed to create socket: {0}")]
    SocketError(String),

    /// The target hostname could not be resolved to an address
    #[error("Failed to resolve host: {0}")]
    ResolutionError(String),

    /// IPv6 targets are not supported
    #[error("IPv6 targets are not supported")]
    Ipv6NotSupported,

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

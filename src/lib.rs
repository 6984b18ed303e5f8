//! geotr - A parallel ICMP traceroute with GeoIP annotation
//!
//! This library discovers the hops towards a target by probing every TTL at
//! once, then annotates each hop with its autonomous system, location and,
//! for networks in China, the carrier it belongs to.

pub mod debug;
pub mod geo;
pub mod probe;
pub mod report;
pub mod socket;
pub mod traceroute;

// Re-export core types for library users
pub use geo::{GeoMode, GeoRecord, GeoResolver, IspLabel, MaxMindDatabase};
pub use probe::{EchoProber, Probe, ProbeOutcome, ProbeStatus, RetryPolicy};
pub use report::{ReportError, ReportFormatter};
pub use socket::{create_echo_socket, EchoSocket, SocketMode};
pub use traceroute::{
    resolve_target, CompactedHopTable, HopTable, TraceConfig, TraceConfigBuilder, TraceError,
    TraceResult, Tracer,
};

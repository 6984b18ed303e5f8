//! Hop discovery: parallel probing, hop tables and the latency pass

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod hops;
pub mod latency;

// Re-export commonly used types
pub use api::{resolve_target, TraceResult, Tracer};
pub use config::{TraceConfig, TraceConfigBuilder};
pub use engine::HopDiscoveryEngine;
pub use error::TraceError;
pub use hops::{CompactedHopTable, HopTable};
pub use latency::{measure_latency, LatencyMap};

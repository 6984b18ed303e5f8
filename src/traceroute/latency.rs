//! Per-hop latency measurement
//!
//! Runs after hop discovery: every distinct responding address receives one
//! echo at full TTL. Duplicate addresses share a single measurement.

use crate::probe::{Probe, ProbeStatus, SENTINEL_ADDR};
use crate::trace_time;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// TTL used for latency probes, high enough to reach any hop directly
pub const LATENCY_TTL: u8 = 64;

/// Maximum number of latency probes in flight at once
pub const MAX_CONCURRENT_LATENCY_PROBES: usize = 16;

/// Measured round-trip time per address, `None` when it never answered
pub type LatencyMap = HashMap<IpAddr, Option<Duration>>;

/// Measure round-trip times to each distinct, non-sentinel address
pub async fn measure_latency(
    prober: Arc<dyn Probe>,
    addresses: &[IpAddr],
    timeout: Duration,
    verbose: u8,
) -> LatencyMap {
    let mut seen = HashSet::new();
    let targets: Vec<IpAddr> = addresses
        .iter()
        .copied()
        .filter(|addr| *addr != SENTINEL_ADDR && seen.insert(*addr))
        .collect();

    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_LATENCY_PROBES));
    let handles: Vec<_> = targets
        .iter()
        .map(|&addr| {
            let prober = Arc::clone(&prober);
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                let outcome = prober.probe(addr, LATENCY_TTL, timeout).await;
                match outcome.status {
                    ProbeStatus::Reached => outcome.rtt,
                    ProbeStatus::IntermediateHop | ProbeStatus::TimedOut => None,
                }
            })
        })
        .collect();

    let mut latencies = LatencyMap::with_capacity(targets.len());
    for (addr, handle) in targets.into_iter().zip(handles) {
        let rtt = handle.await.unwrap_or_else(|e| {
            trace_time!(verbose, "Latency probe to {} failed: {}", addr, e);
            None
        });
        trace_time!(verbose, "Latency to {}: {:?}", addr, rtt);
        latencies.insert(addr, rtt);
    }
    latencies
}

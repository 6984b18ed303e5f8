//! Parallel hop discovery
//!
//! One task per TTL probes the target concurrently. Each task's outcome
//! lands in its own TTL slot of the result vector once all tasks have been
//! joined, so no shared map is ever mutated while probes are in flight.

use crate::probe::{Probe, ProbeOutcome};
use crate::trace_time;
use crate::traceroute::hops::{CompactedHopTable, HopTable};
use crate::traceroute::TraceConfig;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

/// Fans probes out over every TTL and merges their outcomes
pub struct HopDiscoveryEngine {
    prober: Arc<dyn Probe>,
}

impl HopDiscoveryEngine {
    /// Create an engine that probes through `prober`
    pub fn new(prober: Arc<dyn Probe>) -> Self {
        Self { prober }
    }

    /// Probe TTLs `1..max_hops` towards `host` and build the compacted hop table
    pub async fn trace(&self, host: IpAddr, config: &TraceConfig) -> CompactedHopTable {
        let start = Instant::now();
        let slots = self.probe_all(host, config).await;

        trace_time!(
            config.verbose,
            "All {} probes to {} finished in {:?}",
            slots.len(),
            host,
            start.elapsed()
        );

        let table = HopTable::from_slots(slots);
        trace_time!(config.verbose, "{} hops kept before compaction", table.len());
        table.compact()
    }

    /// Run every TTL worker and wait for all of them
    async fn probe_all(&self, host: IpAddr, config: &TraceConfig) -> Vec<Option<ProbeOutcome>> {
        let ttls: Vec<u8> = (1..config.max_hops).collect();
        let timeout = config.timeout;

        let handles: Vec<_> = ttls
            .iter()
            .map(|&ttl| {
                let prober = Arc::clone(&self.prober);
                tokio::spawn(async move { prober.probe(host, ttl, timeout).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(ttls)
            .map(|(joined, ttl)| {
                Some(joined.unwrap_or_else(|e| {
                    trace_time!(config.verbose, "Probe worker for ttl={} failed: {}", ttl, e);
                    ProbeOutcome::timed_out(ttl)
                }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeStatus, SENTINEL_ADDR};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Prober answering from a fixed TTL script, timing out elsewhere
    struct MockProber {
        script: HashMap<u8, ProbeOutcome>,
        reached_from: Option<(u8, IpAddr)>,
        calls: AtomicUsize,
    }

    impl MockProber {
        fn new(script: Vec<ProbeOutcome>) -> Self {
            Self {
                script: script.into_iter().map(|o| (o.ttl, o)).collect(),
                reached_from: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Every TTL at or above `ttl` reaches `addr`, as a real path would
        fn reached_from(mut self, ttl: u8, addr: IpAddr) -> Self {
            self.reached_from = Some((ttl, addr));
            self
        }
    }

    #[async_trait]
    impl Probe for MockProber {
        async fn probe(&self, _host: IpAddr, ttl: u8, _timeout: Duration) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(outcome) = self.script.get(&ttl) {
                return *outcome;
            }
            match self.reached_from {
                Some((from, addr)) if ttl >= from => ProbeOutcome::reached(ttl, addr),
                _ => ProbeOutcome::timed_out(ttl),
            }
        }
    }

    struct PanickingProber;

    #[async_trait]
    impl Probe for PanickingProber {
        async fn probe(&self, host: IpAddr, ttl: u8, _timeout: Duration) -> ProbeOutcome {
            if ttl == 2 {
                panic!("probe worker crashed");
            }
            ProbeOutcome::intermediate(ttl, host)
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn config(max_hops: u8) -> TraceConfig {
        TraceConfig::builder().max_hops(max_hops).build().unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_trace() {
        let target = ip("93.184.216.34");
        let prober = MockProber::new(vec![ProbeOutcome::intermediate(3, ip("10.0.0.1"))])
            .reached_from(4, target);
        let engine = HopDiscoveryEngine::new(Arc::new(prober));

        let table = engine.trace(target, &config(5)).await;

        assert_eq!(table.indices(), vec![1, 2, 3, 4]);
        assert_eq!(
            table.addresses(),
            vec![SENTINEL_ADDR, SENTINEL_ADDR, ip("10.0.0.1"), target]
        );
        assert_eq!(table.get(4).unwrap().status, ProbeStatus::Reached);
    }

    #[tokio::test]
    async fn test_duplicate_destination_collapses() {
        let target = ip("93.184.216.34");
        let prober = MockProber::new(vec![ProbeOutcome::intermediate(3, ip("10.0.0.1"))])
            .reached_from(4, target);
        let engine = HopDiscoveryEngine::new(Arc::new(prober));

        let table = engine.trace(target, &config(10)).await;

        assert_eq!(table.len(), 4);
        let reached: Vec<u8> = table
            .iter()
            .filter(|(_, o)| o.status == ProbeStatus::Reached)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(reached, vec![4]);
    }

    #[tokio::test]
    async fn test_all_timeouts() {
        let prober = Arc::new(MockProber::new(Vec::new()));
        let engine = HopDiscoveryEngine::new(prober.clone());

        let table = engine.trace(ip("198.51.100.7"), &config(30)).await;

        assert_eq!(table.len(), 29);
        assert_eq!(table.indices(), (1..30).collect::<Vec<u8>>());
        assert!(table.iter().all(|(_, o)| o.addr == SENTINEL_ADDR));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 29);
    }

    #[tokio::test]
    async fn test_single_hop_probes_nothing() {
        let prober = Arc::new(MockProber::new(Vec::new()));
        let engine = HopDiscoveryEngine::new(prober.clone());

        let table = engine.trace(ip("198.51.100.7"), &config(1)).await;
        assert!(table.is_empty());

        let table = engine.trace(ip("198.51.100.7"), &config(0)).await;
        assert!(table.is_empty());

        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicked_worker_is_timeout() {
        let engine = HopDiscoveryEngine::new(Arc::new(PanickingProber));
        let host = ip("10.1.1.1");

        let table = engine.trace(host, &config(4)).await;

        assert_eq!(table.indices(), vec![1, 2, 3]);
        assert!(table.get(2).unwrap().is_timeout());
        assert_eq!(table.get(3).unwrap().addr, host);
    }
}

//! High-level trace API

use crate::probe::{EchoProber, Probe};
use crate::socket::create_echo_socket;
use crate::trace_time;
use crate::traceroute::engine::HopDiscoveryEngine;
use crate::traceroute::hops::CompactedHopTable;
use crate::traceroute::latency::{measure_latency, LatencyMap};
use crate::traceroute::{TraceConfig, TraceError};
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::sync::Arc;

/// Resolve a host name or address literal to the address to trace
///
/// IPv4 records are preferred. A host that only has IPv6 addresses is
/// reported as [`TraceError::Ipv6NotSupported`].
pub async fn resolve_target(host: &str) -> Result<IpAddr, TraceError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(TraceError::ResolutionError("empty host".to_string()));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(_) => Ok(ip),
            IpAddr::V6(_) => Err(TraceError::Ipv6NotSupported),
        };
    }

    let resolver = TokioResolver::builder_with_config(
        ResolverConfig::cloudflare(),
        TokioConnectionProvider::default(),
    )
    .build();

    if let Ok(lookup) = resolver.ipv4_lookup(host).await {
        if let Some(ipv4) = lookup.iter().next() {
            return Ok(IpAddr::V4(ipv4.0));
        }
    }

    if let Ok(lookup) = resolver.ipv6_lookup(host).await {
        if lookup.iter().next().is_some() {
            return Err(TraceError::Ipv6NotSupported);
        }
    }

    Err(TraceError::ResolutionError(host.to_string()))
}

/// Hops discovered by one trace, with optional latency measurements
#[derive(Debug, Clone)]
pub struct TraceResult {
    /// Address that was traced
    pub target_ip: IpAddr,
    /// Compacted hops in display order
    pub hops: CompactedHopTable,
    /// Round-trip time per responding address, when requested
    pub latencies: Option<LatencyMap>,
}

/// Runs hop discovery followed by the optional latency pass
///
/// # Examples
///
/// ```no_run
/// use geotr::{TraceConfig, Tracer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TraceConfig::builder().max_hops(20).build()?;
/// let tracer = Tracer::new(config)?;
/// let result = tracer.run("1.1.1.1".parse()?).await;
/// println!("{} hops", result.hops.len());
/// # Ok(())
/// # }
/// ```
pub struct Tracer {
    config: TraceConfig,
    prober: Arc<dyn Probe>,
}

impl Tracer {
    /// Create a tracer backed by an ICMP echo socket
    ///
    /// # Errors
    ///
    /// * `TraceError::ConfigError` - If the configuration is invalid
    /// * `TraceError::InsufficientPermissions` - If no ICMP socket may be opened
    /// * `TraceError::SocketError` - If socket creation fails otherwise
    pub fn new(config: TraceConfig) -> Result<Self, TraceError> {
        config.validate().map_err(TraceError::ConfigError)?;
        let socket = create_echo_socket(config.socket_mode, config.verbose)?;
        let prober = EchoProber::new(Arc::from(socket), config.retry_policy(), config.verbose);
        Ok(Self {
            config,
            prober: Arc::new(prober),
        })
    }

    /// Create a tracer with a custom prober
    pub fn with_prober(config: TraceConfig, prober: Arc<dyn Probe>) -> Result<Self, TraceError> {
        config.validate().map_err(TraceError::ConfigError)?;
        Ok(Self { config, prober })
    }

    /// The configuration this tracer runs with
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Trace the path to `target`
    pub async fn run(&self, target: IpAddr) -> TraceResult {
        let engine = HopDiscoveryEngine::new(Arc::clone(&self.prober));
        let hops = engine.trace(target, &self.config).await;

        let latencies = if self.config.show_latency {
            trace_time!(self.config.verbose, "Measuring latency for {} hops", hops.len());
            Some(
                measure_latency(
                    Arc::clone(&self.prober),
                    &hops.addresses(),
                    self.config.timeout,
                    self.config.verbose,
                )
                .await,
            )
        } else {
            None
        };

        TraceResult {
            target_ip: target,
            hops,
            latencies,
        }
    }
}

//! Configuration types for trace operations

use crate::geo::GeoMode;
use crate::probe::RetryPolicy;
use crate::socket::SocketMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Upper TTL bound, exclusive (default: 30)
    pub max_hops: u8,
    /// Timeout for the first attempt of each probe (default: 1000ms)
    pub timeout: Duration,
    /// Retry timed-out probes (default: false)
    pub retry: bool,
    /// Maximum number of retries per probe (default: 3)
    pub retry_count: u32,
    /// Measure per-hop latency after discovery (default: false)
    pub show_latency: bool,
    /// Annotate hops with geo and operator data (default: true)
    pub show_geo: bool,
    /// How locations are rendered
    pub geo_mode: GeoMode,
    /// Preferred socket mode
    pub socket_mode: Option<SocketMode>,
    /// Verbosity for diagnostic tracing
    pub verbose: u8,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: 30,
            timeout: Duration::from_millis(1000),
            retry: false,
            retry_count: 3,
            show_latency: false,
            show_geo: true,
            geo_mode: GeoMode::City,
            socket_mode: None,
            verbose: 0,
        }
    }
}

impl TraceConfig {
    /// Create a new TraceConfig builder
    pub fn builder() -> TraceConfigBuilder {
        TraceConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Retry policy applied to each probe
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry {
            RetryPolicy {
                enabled: true,
                count: self.retry_count,
            }
        } else {
            RetryPolicy::disabled()
        }
    }
}

/// Builder for TraceConfig
pub struct TraceConfigBuilder {
    config: TraceConfig,
}

impl TraceConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: TraceConfig::default(),
        }
    }

    /// Set the maximum number of hops
    pub fn max_hops(mut self, hops: u8) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// Set the probe timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Enable or disable retries
    pub fn retry(mut self, retry: bool) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the number of retries per probe
    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry_count = count;
        self
    }

    /// Enable or disable the latency column
    pub fn show_latency(mut self, enable: bool) -> Self {
        self.config.show_latency = enable;
        self
    }

    /// Enable or disable the geo column
    pub fn show_geo(mut self, enable: bool) -> Self {
        self.config.show_geo = enable;
        self
    }

    /// Set the geo rendering mode
    pub fn geo_mode(mut self, mode: GeoMode) -> Self {
        self.config.geo_mode = mode;
        self
    }

    /// Set the preferred socket mode
    pub fn socket_mode(mut self, mode: SocketMode) -> Self {
        self.config.socket_mode = Some(mode);
        self
    }

    /// Set the verbosity level
    pub fn verbose(mut self, verbose: u8) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TraceConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TraceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

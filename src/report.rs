//! Fixed-layout report lines for discovered hops
//!
//! Each hop renders as `{index:<3} {address:>15} {latency:>5}`, followed by
//! the geo string unless geo output is suppressed. The latency column is
//! always present and stays blank when latency was not measured, so the geo
//! column starts at the same offset either way.

use crate::geo::{GeoMode, GeoRecord, GeoResolver};
use crate::probe::ProbeOutcome;
use crate::trace_time;
use crate::traceroute::TraceResult;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Line printed after the last hop
pub const FOOTER: &str = "Tracing completed";

const ASN_WIDTH: usize = 50;
const CITY_CARRIER_WIDTH: usize = 5;
const DISTRICT_CARRIER_WIDTH: usize = 10;
const DISTRICT_WIDTH: usize = 8;
const CITY_WIDTH: usize = 20;
const NO_CARRIER: &str = "     ";

/// Failure to produce one hop's line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The geo lookup task for the hop did not complete
    #[error("geo lookup failed: {0}")]
    GeoTask(String),
}

/// Line printed before the first hop
pub fn header(host: &str, max_hops: u8) -> String {
    format!("Trace routes to {host} via Maximum of {max_hops} hops.")
}

/// Render the geo annotation of one address
///
/// An all-empty record renders as an empty string.
pub fn geo_string(record: &GeoRecord, mode: GeoMode) -> String {
    if record.is_empty() {
        return String::new();
    }

    let asn = if record.has_asn() {
        format!("[{} / AS{}] ", record.asn_organization, record.asn_number)
    } else {
        String::new()
    };
    let mut line = format!("{asn:<ASN_WIDTH$}");

    match (record.carrier(), mode) {
        (Some(label), GeoMode::City) => {
            line.push_str(&format!("{:>CITY_CARRIER_WIDTH$}", format!("[{label}] ")));
        }
        (Some(label), GeoMode::District) => {
            line.push_str(&format!("{:<DISTRICT_CARRIER_WIDTH$}", format!("[{label}] ")));
        }
        (None, _) => line.push_str(NO_CARRIER),
    }

    match mode {
        GeoMode::District => {
            line.push_str(&format!("{:<DISTRICT_WIDTH$}", record.district_label));
        }
        GeoMode::City => {
            let location: String = [
                &record.country_code,
                &record.subdivision_code,
                &record.city_name,
            ]
            .iter()
            .filter(|part| !part.trim().is_empty())
            .map(|part| format!("{part} "))
            .collect();
            line.push_str(&format!("{location:<CITY_WIDTH$}"));
        }
    }

    line
}

/// Render the latency column
///
/// `None` means latency was not measured and renders blank; `Some(None)`
/// means the address never answered and renders `*`.
pub fn latency_cell(latency: Option<Option<Duration>>) -> String {
    match latency {
        Some(Some(rtt)) => format!("{:>5}", rtt.as_millis()),
        Some(None) => format!("{:>5}", "*"),
        None => format!("{:>5}", ""),
    }
}

/// Everything known about one displayed hop
#[derive(Debug, Clone)]
pub struct HopReport {
    /// Display index after compaction
    pub index: u8,
    /// The probe outcome shown at this index
    pub outcome: ProbeOutcome,
    /// Latency column value, `None` when latency was not measured
    pub latency: Option<Option<Duration>>,
    /// Geo annotation, `None` when geo output is suppressed
    pub geo: Option<Result<GeoRecord, ReportError>>,
}

impl HopReport {
    /// Address shown for this hop
    pub fn addr(&self) -> IpAddr {
        self.outcome.addr
    }
}

/// Collects per-hop annotations and renders report lines
pub struct ReportFormatter {
    resolver: Option<GeoResolver>,
    mode: GeoMode,
    verbose: u8,
}

impl ReportFormatter {
    /// Create a formatter; without a resolver the geo column is suppressed
    pub fn new(resolver: Option<GeoResolver>, mode: GeoMode, verbose: u8) -> Self {
        Self {
            resolver,
            mode,
            verbose,
        }
    }

    /// Resolve geo data for every hop of `result`, in display order
    ///
    /// Hops are resolved concurrently. A lookup task that fails only marks
    /// its own hop as failed.
    pub async fn collect(&self, result: &TraceResult) -> Vec<HopReport> {
        let handles: Vec<_> = result
            .hops
            .iter()
            .map(|(_, outcome)| {
                self.resolver.clone().map(|resolver| {
                    let mode = self.mode;
                    let addr = outcome.addr;
                    tokio::spawn(async move { resolver.resolve(addr, mode).await })
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for ((index, outcome), handle) in result.hops.iter().zip(handles) {
            let geo = match handle {
                Some(handle) => Some(handle.await.map_err(|e| {
                    trace_time!(self.verbose, "Geo task for hop {} failed: {}", index, e);
                    ReportError::GeoTask(e.to_string())
                })),
                None => None,
            };
            let latency = result
                .latencies
                .as_ref()
                .map(|latencies| latencies.get(&outcome.addr).copied().flatten());

            reports.push(HopReport {
                index,
                outcome: *outcome,
                latency,
                geo,
            });
        }
        reports
    }

    /// Render one hop as a report line
    pub fn render_line(&self, hop: &HopReport) -> String {
        let prefix = format!("{:<3} {:>15}", hop.index, hop.addr().to_string());

        let geo = match &hop.geo {
            Some(Err(e)) => return format!("{prefix} {e}"),
            Some(Ok(record)) => Some(geo_string(record, self.mode)),
            None => None,
        };

        let mut line = format!("{prefix} {}", latency_cell(hop.latency));
        if let Some(geo) = geo {
            line.push(' ');
            line.push_str(&geo);
        }
        line
    }
}

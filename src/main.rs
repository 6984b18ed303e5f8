//! geotr - A parallel ICMP traceroute with GeoIP and carrier annotation.
//!
//! This is the command-line interface for the geotr library.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser};
use geotr::debug::{level_filter, verbosity_from_env};
use geotr::geo::locate_db_dir;
use geotr::report::{header, HopReport, FOOTER};
use geotr::{
    GeoMode, GeoRecord, GeoResolver, MaxMindDatabase, ProbeStatus, ReportFormatter, SocketMode,
    TraceConfigBuilder, TraceError, Tracer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Get the version string for geotr
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for the traceroute tool.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Parallel ICMP traceroute with GeoIP, ASN and carrier annotation",
    long_about = None,
    disable_help_flag = true
)]
struct Args {
    /// Target hostname or IP address
    host: Option<String>,

    /// Maximum number of hops to search for the target
    #[arg(short = 'h', long = "hops", default_value_t = 30)]
    max_hops: u8,

    /// Timeout in milliseconds to wait for each reply
    #[arg(short = 'w', long = "timeout", default_value_t = 1000)]
    timeout_ms: u64,

    /// Number of times to retry a hop that timed out
    #[arg(short = 'c', long = "count", default_value_t = 3)]
    retry_count: u32,

    /// Retry sending requests when hops time out
    #[arg(short = 'r', long)]
    retry: bool,

    /// Measure and show the latency of each hop
    #[arg(short = 'l', long)]
    latency: bool,

    /// Do not annotate hops with geo and ASN data
    #[arg(short = 'n', long)]
    no_geo: bool,

    /// How hop locations are shown (defaults to the system locale)
    #[arg(long, value_enum)]
    geo_mode: Option<GeoModeArg>,

    /// Directory holding GeoLite2-ASN.mmdb and GeoLite2-City.mmdb
    #[arg(long, env = "GEOTR_DB_DIR")]
    db_dir: Option<PathBuf>,

    /// Socket mode to use (raw, dgram)
    #[arg(long, value_enum)]
    socket_mode: Option<SocketModeArg>,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Enable verbose output (use -vv for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum GeoModeArg {
    City,
    District,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SocketModeArg {
    Raw,
    Dgram,
}

/// JSON output structure for a single hop
#[derive(Debug, serde::Serialize)]
struct JsonHop {
    index: u8,
    ttl: u8,
    address: String,
    status: ProbeStatus,
    latency_ms: Option<f64>,
    geo: Option<GeoRecord>,
    carrier: Option<String>,
    error: Option<String>,
}

/// JSON output structure for the entire trace
#[derive(Debug, serde::Serialize)]
struct JsonOutput {
    version: String,
    target: String,
    target_ip: String,
    max_hops: u8,
    geo_mode: GeoMode,
    destination_reached: bool,
    hops: Vec<JsonHop>,
}

fn main() {
    let args = Args::parse();
    let verbose = args.verbose.max(verbosity_from_env());

    env_logger::Builder::new()
        .filter_level(level_filter(verbose))
        .format_timestamp(None)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(async_main(args, verbose)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn async_main(args: Args, verbose: u8) -> Result<()> {
    let host = match args.host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            println!("The target host address should not be empty.");
            println!();
            Args::command().print_help()?;
            return Ok(());
        }
    };

    // Check if running without root on a platform that requires it
    if !geotr::socket::utils::is_root() && !geotr::socket::utils::has_non_root_capability() {
        eprintln!(
            "Error: geotr requires root privileges on {}",
            std::env::consts::OS
        );
        eprintln!("This platform does not support unprivileged ICMP sockets.");
        eprintln!(
            "Please run with sudo: sudo {}",
            std::env::args().collect::<Vec<_>>().join(" ")
        );
        std::process::exit(1);
    }

    let geo_mode = match args.geo_mode {
        Some(GeoModeArg::City) => GeoMode::City,
        Some(GeoModeArg::District) => GeoMode::District,
        None => GeoMode::detect(),
    };

    let mut builder = TraceConfigBuilder::new()
        .max_hops(args.max_hops)
        .timeout(Duration::from_millis(args.timeout_ms))
        .retry(args.retry)
        .retry_count(args.retry_count)
        .show_latency(args.latency)
        .show_geo(!args.no_geo)
        .geo_mode(geo_mode)
        .verbose(verbose);

    if let Some(mode) = args.socket_mode {
        builder = builder.socket_mode(match mode {
            SocketModeArg::Raw => SocketMode::Raw,
            SocketModeArg::Dgram => SocketMode::Dgram,
        });
    }

    let config = builder.build().map_err(TraceError::ConfigError)?;

    let target_ip = geotr::resolve_target(&host).await?;

    let tracer = match Tracer::new(config) {
        Ok(tracer) => tracer,
        Err(TraceError::InsufficientPermissions {
            required,
            suggestion,
        }) => {
            eprintln!("Error: Insufficient permissions");
            eprintln!("Required: {}", required);
            eprintln!("Suggestion: {}", suggestion);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let config = tracer.config();

    let resolver = config.show_geo.then(|| {
        let db_dir = locate_db_dir(args.db_dir.as_deref());
        let db = MaxMindDatabase::open(&db_dir);
        if db.is_empty() {
            eprintln!(
                "Warning: no geo databases found in {}, geo columns will be empty",
                db_dir.display()
            );
        }
        GeoResolver::new(Arc::new(db), verbose)
    });
    let formatter = ReportFormatter::new(resolver, config.geo_mode, verbose);

    if !args.json {
        println!();
        println!("{}", header(&host, config.max_hops));
        println!();
    }

    let result = tracer.run(target_ip).await;
    let hops = formatter.collect(&result).await;

    if args.json {
        let output = JsonOutput {
            version: get_version().to_string(),
            target: host,
            target_ip: result.target_ip.to_string(),
            max_hops: config.max_hops,
            geo_mode: config.geo_mode,
            destination_reached: result.hops.destination_reached(),
            hops: hops.iter().map(json_hop).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for hop in &hops {
            println!("{}", formatter.render_line(hop));
        }
        println!();
        println!("{}", FOOTER);
        println!();
    }

    Ok(())
}

/// Convert one hop report to its JSON form
fn json_hop(hop: &HopReport) -> JsonHop {
    let (geo, error) = match &hop.geo {
        Some(Ok(record)) => (Some(record.clone()), None),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, None),
    };

    JsonHop {
        index: hop.index,
        ttl: hop.outcome.ttl,
        address: hop.addr().to_string(),
        status: hop.outcome.status,
        latency_ms: hop.latency.flatten().map(|rtt| rtt.as_micros() as f64 / 1000.0),
        carrier: geo
            .as_ref()
            .and_then(GeoRecord::carrier)
            .map(|label| label.to_string()),
        geo,
        error,
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;

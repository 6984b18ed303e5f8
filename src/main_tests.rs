//! Tests for main.rs functionality

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::*;
    use clap::Parser;
    use geotr::report::ReportError;
    use geotr::ProbeOutcome;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());

        #[cfg(debug_assertions)]
        assert!(version.ends_with("-UNRELEASED"));

        #[cfg(not(debug_assertions))]
        assert!(!version.contains("UNRELEASED"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["geotr", "example.com"]).unwrap();
        assert_eq!(args.host.as_deref(), Some("example.com"));
        assert_eq!(args.max_hops, 30);
        assert_eq!(args.timeout_ms, 1000);
        assert_eq!(args.retry_count, 3);
        assert!(!args.retry);
        assert!(!args.latency);
        assert!(!args.no_geo);
        assert!(!args.json);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from([
            "geotr", "-h", "16", "-w", "250", "-c", "2", "-r", "-l", "-n", "-vv", "1.1.1.1",
        ])
        .unwrap();
        assert_eq!(args.max_hops, 16);
        assert_eq!(args.timeout_ms, 250);
        assert_eq!(args.retry_count, 2);
        assert!(args.retry);
        assert!(args.latency);
        assert!(args.no_geo);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.host.as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn test_help_flags() {
        for flag in ["-?", "--help"] {
            let err = Args::try_parse_from(["geotr", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn test_host_is_optional() {
        let args = Args::try_parse_from(["geotr"]).unwrap();
        assert!(args.host.is_none());
    }

    #[test]
    fn test_geo_mode_arg() {
        let args = Args::try_parse_from(["geotr", "--geo-mode", "district", "x"]).unwrap();
        assert!(matches!(args.geo_mode, Some(GeoModeArg::District)));

        let result = Args::try_parse_from(["geotr", "--geo-mode", "planet", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_hop_with_geo() {
        let record = GeoRecord {
            asn_organization: "China Mobile".to_string(),
            asn_number: 9808,
            country_code: "CN".to_string(),
            ..GeoRecord::default()
        };
        let hop = HopReport {
            index: 4,
            outcome: ProbeOutcome::reached(9, "111.13.1.1".parse().unwrap()),
            latency: Some(Some(Duration::from_micros(12_500))),
            geo: Some(Ok(record)),
        };

        let json = json_hop(&hop);
        assert_eq!(json.index, 4);
        assert_eq!(json.ttl, 9);
        assert_eq!(json.address, "111.13.1.1");
        assert_eq!(json.latency_ms, Some(12.5));
        assert_eq!(json.carrier.as_deref(), Some("CM"));
        assert!(json.error.is_none());

        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["status"], "Reached");
        assert_eq!(value["geo"]["asn_number"], 9808);
    }

    #[test]
    fn test_json_hop_with_error() {
        let hop = HopReport {
            index: 2,
            outcome: ProbeOutcome::timed_out(2),
            latency: None,
            geo: Some(Err(ReportError::GeoTask("panicked".to_string()))),
        };

        let json = json_hop(&hop);
        assert_eq!(json.address, "0.0.0.0");
        assert!(json.geo.is_none());
        assert!(json.carrier.is_none());
        assert!(json.latency_ms.is_none());
        assert_eq!(json.error.as_deref(), Some("geo lookup failed: panicked"));
    }
}

//! Verbosity-gated diagnostic logging
//!
//! Diagnostics go through the `log` facade. Call sites pass the verbosity
//! level they were configured with so that library users who never raise it
//! pay nothing for the formatting.

#[doc(hidden)]
pub use log;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// Environment variable holding the verbosity level for socket-level tracing
pub const VERBOSE_ENV: &str = "GEOTR_VERBOSE";

static PROCESS_START: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Time elapsed since the first diagnostic of this process
pub fn elapsed() -> Duration {
    PROCESS_START.elapsed()
}

/// Read the verbosity level from `GEOTR_VERBOSE`, defaulting to 0
pub fn verbosity_from_env() -> u8 {
    std::env::var(VERBOSE_ENV)
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(0)
}

/// Map a `-v` count to the `log` level filter the binary installs
pub fn level_filter(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Log a timestamped diagnostic when `verbose` is at least 1
///
/// ```
/// let verbose = 1u8;
/// geotr::trace_time!(verbose, "probing ttl={}", 3);
/// ```
#[macro_export]
macro_rules! trace_time {
    ($verbose:expr, $($arg:tt)*) => {
        if $verbose >= 1 {
            let elapsed = $crate::debug::elapsed();
            $crate::debug::log::debug!(
                "[{:>4}.{:03}s] {}",
                elapsed.as_secs(),
                elapsed.subsec_millis(),
                format_args!($($arg)*)
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0), log::LevelFilter::Warn);
        assert_eq!(level_filter(1), log::LevelFilter::Debug);
        assert_eq!(level_filter(2), log::LevelFilter::Trace);
        assert_eq!(level_filter(9), log::LevelFilter::Trace);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let first = elapsed();
        let second = elapsed();
        assert!(second >= first);
    }

    #[test]
    fn test_macro_accepts_quiet_level() {
        // Must compile and do nothing at level 0
        trace_time!(0u8, "never formatted {}", 1);
        trace_time!(2u8, "formatted {}", 2);
    }
}

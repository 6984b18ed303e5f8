//! Utility functions for socket operations

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Check if the platform can trace without root
///
/// Only ICMP datagram sockets work unprivileged, and only Linux (with
/// `ping_group_range`) and macOS offer them.
pub fn has_non_root_capability() -> bool {
    cfg!(any(target_os = "linux", target_os = "macos"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_matches_platform() {
        if cfg!(target_os = "linux") || cfg!(target_os = "macos") {
            assert!(has_non_root_capability());
        } else {
            assert!(!has_non_root_capability());
        }
    }

    #[test]
    fn test_is_root_does_not_panic() {
        let _ = is_root();
    }
}

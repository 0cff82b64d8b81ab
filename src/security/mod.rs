pub mod target;

pub use target::{check_target, TargetUse};

/// Check if a host string represents a non-localhost bind address.
pub fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_are_not_public() {
        for host in ["127.0.0.1", "localhost", "::1", "[::1]", "0:0:0:0:0:0:0:1"] {
            assert!(!is_public_bind(host), "{host}");
        }
    }

    #[test]
    fn wildcard_and_lan_hosts_are_public() {
        for host in ["0.0.0.0", "::", "192.168.1.20", "toolgate.lan"] {
            assert!(is_public_bind(host), "{host}");
        }
    }
}

//! Pre-flight DNS check for marketplace hosts.

use std::time::Duration;
use tokio::net::lookup_host;
use tracing::{debug, warn};

const DNS_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolve `host`, returning false on failure or timeout.
pub async fn resolves(host: &str) -> bool {
    match tokio::time::timeout(DNS_TIMEOUT, lookup_host((host, 443))).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        Ok(Err(e)) => {
            debug!("lookup_host({host}) failed: {e}");
            false
        }
        Err(_) => false,
    }
}

/// Log a warning for every host that does not resolve. Never fails.
pub async fn warn_unresolved(hosts: &[&str]) {
    for host in hosts {
        if !resolves(host).await {
            warn!("DNS lookup failed for {host}; results from it will likely be empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_localhost_resolves() {
        assert!(resolves("localhost").await);
    }

    #[tokio::test]
    async fn test_invalid_host_does_not_resolve() {
        assert!(!resolves("no-such-host.invalid").await);
    }
}

//! DNS reverse lookup for hostname resolution

use dns_lookup::lookup_addr;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Perform reverse DNS lookup for a single IP address
pub fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let ip_addr = IpAddr::V4(ip);
    match lookup_addr(&ip_addr) {
        Ok(hostname) => {
            // Don't return if hostname is just the IP address
            if hostname != ip.to_string() {
                Some(hostname)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Reverse lookup with a hard timeout, safe to call from async code
///
/// The resolver call is synchronous, so it runs under `spawn_blocking`;
/// a timeout or resolver failure yields `None` rather than an error.
pub async fn resolve_hostname(ip: Ipv4Addr, timeout: Duration) -> Option<String> {
    let lookup = tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || {
        reverse_lookup(ip)
    }))
    .await;

    match lookup {
        Ok(Ok(hostname)) => hostname,
        Ok(Err(e)) => {
            tracing::warn!("DNS worker join failed for {}: {}", ip, e);
            None
        }
        Err(_) => {
            tracing::debug!("Reverse DNS for {} timed out", ip);
            None
        }
    }
}

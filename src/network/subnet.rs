//! Subnet resolution and target expansion
//!
//! The local subnet is derived from the route the OS would use to reach a
//! well-known public address: a connectionless socket is "connected" to the
//! probe target (no packet leaves the host), the kernel picks the source
//! address, and the matching interface supplies the netmask.

use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::models::InterfaceInfo;
use crate::network::interface::find_interface_for_ip;

/// Maximum hosts to sweep (prevents blasting huge /16 subnets)
const MAX_SWEEP_HOSTS: usize = 254;

/// The local interface the host routes through, with its subnet
#[derive(Debug, Clone)]
pub struct LocalNet {
    pub interface: InterfaceInfo,
    pub network: Ipv4Network,
}

/// Resolve the subnet the host uses to reach the public internet
///
/// Returns `Ok(None)` when no interface matches the routed address;
/// callers must treat that as "skip network I/O this cycle", not a fault.
pub fn resolve_local_subnet(probe_target: &str) -> Result<Option<LocalNet>> {
    let local_ip = match route_local_ip(probe_target) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!("Outbound route probe failed: {:#}", e);
            return Ok(None);
        }
    };

    let Some(interface) = find_interface_for_ip(local_ip) else {
        tracing::warn!("No interface carries routed address {}", local_ip);
        return Ok(None);
    };

    let network = Ipv4Network::new(interface.ip, interface.prefix_len)
        .context("Failed to build network from interface address and prefix")?;

    tracing::debug!(
        "Resolved local subnet {}/{} via {}",
        network.network(),
        network.prefix(),
        interface.name
    );

    Ok(Some(LocalNet { interface, network }))
}

/// Let the OS routing table pick the local address for the probe target
fn route_local_ip(probe_target: &str) -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind probe socket")?;
    // No datagram is sent; connect() alone makes the kernel choose a source.
    socket
        .connect(probe_target)
        .with_context(|| format!("Failed to route toward {}", probe_target))?;

    match socket
        .local_addr()
        .context("Failed to read probe socket address")?
        .ip()
    {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => Err(anyhow::anyhow!(
            "Probe socket bound to IPv6 address {}; IPv4 subnet required",
            ip
        )),
    }
}

/// Checks if an IP address is a network or broadcast address
pub fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

/// Expand the subnet into the list of target IPs for a sweep
///
/// Excludes network and broadcast addresses and caps the list at
/// `MAX_SWEEP_HOSTS`, windowed around the local IP.
pub fn sweep_targets(interface: &InterfaceInfo) -> Result<(Ipv4Network, Vec<Ipv4Addr>)> {
    let network = Ipv4Network::new(interface.ip, interface.prefix_len)
        .context("Failed to create network from interface IP and prefix")?;

    let subnet = Ipv4Network::new(network.network(), interface.prefix_len)
        .context("Failed to create subnet network")?;

    let all_ips: Vec<Ipv4Addr> = subnet
        .iter()
        .filter(|ip| !is_special_address(*ip, &subnet))
        .collect();

    let ips = if all_ips.len() > MAX_SWEEP_HOSTS {
        tracing::warn!(
            "Subnet {} has {} hosts, limiting sweep to {} hosts",
            subnet,
            all_ips.len(),
            MAX_SWEEP_HOSTS
        );
        // Center the sweep window around the local IP index within the subnet host list.
        let center_index = all_ips
            .iter()
            .position(|ip| *ip == interface.ip)
            .unwrap_or(all_ips.len() / 2);
        let half_window = MAX_SWEEP_HOSTS / 2;

        let mut start = center_index.saturating_sub(half_window);
        if start + MAX_SWEEP_HOSTS > all_ips.len() {
            start = all_ips.len().saturating_sub(MAX_SWEEP_HOSTS);
        }

        all_ips
            .into_iter()
            .skip(start)
            .take(MAX_SWEEP_HOSTS)
            .collect()
    } else {
        all_ips
    };

    tracing::debug!("Subnet {} expands to {} sweep targets", subnet, ips.len());

    Ok((subnet, ips))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::datalink::NetworkInterface;
    use pnet::util::MacAddr;

    fn create_test_interface(ip: &str, prefix_len: u8) -> InterfaceInfo {
        InterfaceInfo {
            name: "eth0".to_string(),
            ip: ip.parse().unwrap(),
            mac: MacAddr::zero(),
            prefix_len,
            pnet_interface: NetworkInterface {
                name: "eth0".to_string(),
                description: "Test interface".to_string(),
                index: 0,
                mac: None,
                ips: vec![],
                flags: 0,
            },
        }
    }

    #[test]
    fn test_is_special_address_network() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let network_addr: Ipv4Addr = "192.168.1.0".parse().unwrap();

        assert!(is_special_address(network_addr, &subnet));
    }

    #[test]
    fn test_is_special_address_broadcast() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let broadcast_addr: Ipv4Addr = "192.168.1.255".parse().unwrap();

        assert!(is_special_address(broadcast_addr, &subnet));
    }

    #[test]
    fn test_is_special_address_regular_ip() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let regular: Ipv4Addr = "192.168.1.100".parse().unwrap();

        assert!(!is_special_address(regular, &subnet));
    }

    #[test]
    fn test_sweep_targets_class_c() {
        let interface = create_test_interface("192.168.1.10", 24);

        let (subnet, ips) = sweep_targets(&interface).unwrap();
        assert_eq!(subnet.prefix(), 24);
        assert_eq!(ips.len(), 254); // 256 - 2 (network + broadcast)

        // Should not contain network or broadcast
        assert!(!ips.contains(&"192.168.1.0".parse().unwrap()));
        assert!(!ips.contains(&"192.168.1.255".parse().unwrap()));

        // Should contain valid IPs
        assert!(ips.contains(&"192.168.1.1".parse().unwrap()));
        assert!(ips.contains(&"192.168.1.254".parse().unwrap()));
    }

    #[test]
    fn test_sweep_targets_small_subnet() {
        let interface = create_test_interface("192.168.1.10", 30);

        let (_, ips) = sweep_targets(&interface).unwrap();
        assert_eq!(ips.len(), 2); // 4 - 2 (network + broadcast)
    }

    #[test]
    fn test_sweep_targets_caps_large_subnet() {
        let interface = create_test_interface("10.0.3.10", 16);

        let (_, ips) = sweep_targets(&interface).unwrap();
        assert_eq!(ips.len(), 254);
        // The window stays centered on the local address.
        assert!(ips.contains(&"10.0.3.10".parse().unwrap()));
    }
}

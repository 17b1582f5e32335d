//! Network interface detection

use pnet::datalink;
use pnet::util::MacAddr;
use std::net::{IpAddr, Ipv4Addr};

use crate::models::InterfaceInfo;

fn collect_candidate_interfaces(
    pnet_interfaces: &[datalink::NetworkInterface],
) -> Vec<InterfaceInfo> {
    let mut candidates: Vec<InterfaceInfo> = Vec::new();

    for pnet_if in pnet_interfaces {
        if pnet_if.is_loopback() {
            continue;
        }

        // Skip interfaces without MAC
        let mac = match pnet_if.mac {
            Some(m) if m != MacAddr::zero() => m,
            _ => continue,
        };

        // Find IPv4 addresses
        for ip_network in &pnet_if.ips {
            if let IpAddr::V4(ipv4) = ip_network.ip() {
                // Skip unassigned placeholder addresses.
                if ipv4.is_unspecified() || ip_network.prefix() == 0 {
                    continue;
                }

                // Skip link-local (169.254.x.x)
                if ipv4.octets()[0] == 169 && ipv4.octets()[1] == 254 {
                    continue;
                }

                candidates.push(InterfaceInfo {
                    name: pnet_if.name.clone(),
                    ip: ipv4,
                    mac,
                    prefix_len: ip_network.prefix(),
                    pnet_interface: pnet_if.clone(),
                });
            }
        }
    }

    candidates
}

/// Find the interface that carries the given IPv4 address
///
/// Used by the subnet resolver to match the OS-routed local address back
/// to a concrete interface and its netmask.
pub fn find_interface_for_ip(ip: Ipv4Addr) -> Option<InterfaceInfo> {
    let pnet_interfaces = datalink::interfaces();
    let candidates = collect_candidate_interfaces(&pnet_interfaces);

    let found = candidates.into_iter().find(|candidate| candidate.ip == ip);

    if found.is_none() {
        tracing::debug!(
            "No interface carries address {}; {} interfaces inspected",
            ip,
            pnet_interfaces.len()
        );
    }

    found
}

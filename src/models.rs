//! Data models shared across the discovery engine

use anyhow::{anyhow, Result};
use pnet::datalink::NetworkInterface;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

/// Network interface information with MAC address
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub prefix_len: u8,
    pub pnet_interface: NetworkInterface,
}

/// Enrichment results for one observed device
///
/// `None` means the field was not looked up this cycle or the lookup
/// failed; the stored value stays untouched either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub hostname: Option<String>,
    pub vendor: Option<String>,
}

/// Normalize a MAC address to lowercase colon-separated hex
///
/// Accepts `:`/`-`/`.`-separated or bare 12-hex-digit forms. Anything else
/// is rejected at the boundary so malformed input never reaches the store.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let hex: String = raw
        .chars()
        .filter(|c| *c != ':' && *c != '-' && *c != '.')
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid MAC address: '{}'", raw));
    }

    let hex = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// Resolve the human-readable label for a device
///
/// Precedence: user-assigned name, then reverse-DNS hostname, then raw IP.
pub fn device_label<'a>(name: Option<&'a str>, hostname: Option<&'a str>, ip: &'a str) -> &'a str {
    name.filter(|n| !n.is_empty())
        .or_else(|| hostname.filter(|h| !h.is_empty()))
        .unwrap_or(ip)
}

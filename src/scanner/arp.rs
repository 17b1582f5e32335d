//! Active ARP sweeping
//!
//! One broadcast round per cycle: every target gets a single request and
//! all replies arriving before the fixed deadline are collected. Devices
//! that stay silent past the deadline count as absent for the cycle.

use anyhow::{anyhow, Result};
use ipnetwork::Ipv4Network;
use pnet::datalink::{self, Channel, Config};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::InterfaceInfo;
use crate::network::is_special_address;

/// Broadcast MAC address for ARP requests
const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Receive poll granularity; keeps the receiver responsive to the deadline.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Creates an ARP request packet
fn create_arp_request(
    source_mac: MacAddr,
    source_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; 42];

    // Build Ethernet frame
    {
        let mut ethernet_packet = MutableEthernetPacket::new(&mut buffer[..14])
            .ok_or_else(|| anyhow!("Failed to construct Ethernet packet buffer"))?;
        ethernet_packet.set_destination(BROADCAST_MAC);
        ethernet_packet.set_source(source_mac);
        ethernet_packet.set_ethertype(EtherTypes::Arp);
    }

    // Build ARP packet
    {
        let mut arp_packet = MutableArpPacket::new(&mut buffer[14..42])
            .ok_or_else(|| anyhow!("Failed to construct ARP packet buffer"))?;
        arp_packet.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp_packet.set_protocol_type(EtherTypes::Ipv4);
        arp_packet.set_hw_addr_len(6);
        arp_packet.set_proto_addr_len(4);
        arp_packet.set_operation(ArpOperations::Request);
        arp_packet.set_sender_hw_addr(source_mac);
        arp_packet.set_sender_proto_addr(source_ip);
        arp_packet.set_target_hw_addr(MacAddr::zero());
        arp_packet.set_target_proto_addr(target_ip);
    }

    Ok(buffer)
}

/// Sweep the subnet with one ARP broadcast round
///
/// Returns every (IP, MAC) pair that answered before `timeout` elapsed.
/// No retry: a single timeout window per cycle is the complete sweep.
pub fn arp_sweep(
    interface: &InterfaceInfo,
    targets: &[Ipv4Addr],
    subnet: &Ipv4Network,
    timeout: Duration,
) -> Result<HashMap<Ipv4Addr, MacAddr>> {
    tracing::info!(
        "ARP sweeping {} hosts on {} ({}ms window)...",
        targets.len(),
        subnet,
        timeout.as_millis()
    );

    let mut channel_config = Config::default();
    channel_config.read_timeout = Some(RECV_POLL_INTERVAL);

    // Open datalink channel
    let (mut tx, mut rx) = match datalink::channel(&interface.pnet_interface, channel_config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => return Err(anyhow!("Unsupported channel type")),
        Err(e) => {
            let error_msg = format!("{}", e);
            if error_msg.contains("permission") || error_msg.contains("Operation not permitted") {
                return Err(anyhow!(
                    "Failed to open network interface for ARP sweeping.\n\
                     Raw socket access requires elevated privileges \
                     (root or CAP_NET_RAW).\n\
                     Original error: {}",
                    e
                ));
            }
            return Err(anyhow!("Failed to open datalink channel: {}", e));
        }
    };

    let discovered: Arc<Mutex<HashMap<Ipv4Addr, MacAddr>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let sweep_start = Instant::now();
    let deadline = sweep_start + timeout;

    let discovered_clone = Arc::clone(&discovered);
    let subnet_clone = *subnet;

    // Start receiver thread; it runs until the fixed deadline.
    let receiver_handle = std::thread::spawn(move || {
        while Instant::now() < deadline {
            match rx.next() {
                Ok(packet) => {
                    if let Some(ethernet) = EthernetPacket::new(packet) {
                        if ethernet.get_ethertype() == EtherTypes::Arp {
                            if let Some(arp) = ArpPacket::new(ethernet.payload()) {
                                if arp.get_operation() == ArpOperations::Reply {
                                    let sender_ip = arp.get_sender_proto_addr();
                                    let sender_mac = arp.get_sender_hw_addr();

                                    if subnet_clone.contains(sender_ip)
                                        && !is_special_address(sender_ip, &subnet_clone)
                                    {
                                        let mut map = match discovered_clone.lock() {
                                            Ok(map) => map,
                                            Err(_) => {
                                                tracing::error!(
                                                    "ARP receiver map lock poisoned; stopping receiver thread"
                                                );
                                                break;
                                            }
                                        };
                                        map.entry(sender_ip).or_insert(sender_mac);
                                    }
                                }
                            }
                        }
                    }
                }
                Err(_) => {
                    // Read timeout; loop back to re-check the deadline.
                }
            }
        }
    });

    // Give receiver time to start
    std::thread::sleep(Duration::from_millis(10));

    // Blast one request per target as fast as possible.
    for target_ip in targets {
        match create_arp_request(interface.mac, interface.ip, *target_ip) {
            Ok(packet) => {
                let _ = tx.send_to(&packet, None);
            }
            Err(e) => {
                tracing::warn!("Failed to create ARP request for {}: {}", target_ip, e);
            }
        }
    }

    // Wait out the reply window.
    if receiver_handle.join().is_err() {
        return Err(anyhow!("ARP receiver thread panicked"));
    }

    let map = discovered
        .lock()
        .map_err(|_| anyhow!("ARP discovered-host map lock poisoned"))?;
    for (ip, mac) in map.iter() {
        tracing::debug!("[ARP] Found: {} -> {}", ip, mac);
    }

    tracing::info!(
        "ARP sweep complete: {} hosts answered in {:?}",
        map.len(),
        sweep_start.elapsed()
    );

    Ok(map.clone())
}

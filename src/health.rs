//! Network health scoring
//!
//! A coarse qualitative score derived from online device counts, one
//! latency probe, and the host's interface byte counters.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use sysinfo::Networks;

use crate::database::DeviceRecord;

/// Summary statistics for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub network_health: String,
    pub total_devices: usize,
    pub online_devices: usize,
    pub latency: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// Coarse boolean signal (0 for Excellent/Good, 1 otherwise), not an alert count.
    pub active_alerts: u8,
    pub next_update: String,
}

/// Score the network and map the score to a qualitative label
pub fn score_network(
    online_devices: usize,
    latency_ms: Option<u64>,
    bytes_sent: u64,
    bytes_recv: u64,
) -> (i32, &'static str) {
    let mut score = 100;

    match latency_ms {
        None => score -= 50,
        Some(ms) if ms > 150 => score -= 30,
        Some(ms) if ms > 80 => score -= 15,
        Some(_) => {}
    }

    if online_devices == 0 {
        score -= 30;
    }

    if bytes_recv < 10_000 && bytes_sent < 10_000 {
        score -= 15;
    }

    let label = if score >= 85 {
        "Excellent"
    } else if score >= 65 {
        "Good"
    } else if score >= 40 {
        "Fair"
    } else {
        "Poor"
    };

    (score, label)
}

/// Parse a probe result of the form `"23ms"`; `"timeout"` maps to `None`
fn parse_latency_ms(latency: &str) -> Option<u64> {
    latency.strip_suffix("ms")?.trim().parse().ok()
}

/// Build a health report from a device snapshot and fresh probe readings
pub fn compute_health(
    devices: &[DeviceRecord],
    latency: &str,
    bytes_sent: u64,
    bytes_recv: u64,
    next_update: Duration,
) -> HealthReport {
    let online_devices = devices.iter().filter(|d| d.online).count();
    let latency_ms = parse_latency_ms(latency);
    let (_score, label) = score_network(online_devices, latency_ms, bytes_sent, bytes_recv);

    HealthReport {
        network_health: label.to_string(),
        total_devices: devices.len(),
        online_devices,
        latency: if latency_ms.is_some() {
            latency.to_string()
        } else {
            "timeout".to_string()
        },
        bytes_sent,
        bytes_recv,
        active_alerts: if label == "Excellent" || label == "Good" {
            0
        } else {
            1
        },
        next_update: format!("{}s", next_update.as_secs()),
    }
}

/// Total bytes sent/received across all host interfaces
pub fn read_io_counters() -> (u64, u64) {
    let networks = Networks::new_with_refreshed_list();

    let mut bytes_sent = 0u64;
    let mut bytes_recv = 0u64;
    for (_name, data) in &networks {
        bytes_sent = bytes_sent.saturating_add(data.total_transmitted());
        bytes_recv = bytes_recv.saturating_add(data.total_received());
    }

    (bytes_sent, bytes_recv)
}

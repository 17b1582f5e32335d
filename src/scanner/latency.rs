//! ICMP latency probe for health scoring

use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

/// Probe timeout; a host slower than this reports as "timeout".
const LATENCY_TIMEOUT: Duration = Duration::from_secs(2);

/// Generates a random ping identifier
fn rand_id() -> u16 {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    ((duration.as_nanos() % 0xFFFF) as u16).wrapping_add(1)
}

/// Ping the target once and report the round trip as `"Ntms"` or `"timeout"`
pub async fn measure_latency(target: &str) -> String {
    let ip: IpAddr = match target.parse() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!("Invalid latency probe target '{}': {}", target, e);
            return "timeout".to_string();
        }
    };

    let config = Config::default();
    let client = match Client::new(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("ICMP client unavailable ({}), reporting timeout", e);
            return "timeout".to_string();
        }
    };

    let payload = [0u8; 56];
    let mut pinger = client.pinger(ip, PingIdentifier(rand_id())).await;
    pinger.timeout(LATENCY_TIMEOUT);

    match pinger.ping(PingSequence(0), &payload).await {
        Ok((_packet, rtt)) => format!("{}ms", rtt.as_millis()),
        Err(_) => "timeout".to_string(),
    }
}

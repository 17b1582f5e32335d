//! Engine configuration
//!
//! All tunables are external configuration, read from `NETVIEW_*`
//! environment variables with clamped parsing and compiled-in defaults.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PROBE_TARGET: &str = "8.8.8.8:80";
const DEFAULT_VENDOR_ENDPOINT: &str = "https://api.macvendors.com";
const DEFAULT_LATENCY_TARGET: &str = "8.8.8.8";
const DEFAULT_ARP_TIMEOUT_MS: u64 = 2000;
const DEFAULT_HOSTNAME_TTL_SECS: u64 = 3600;
const DEFAULT_VENDOR_TTL_SECS: u64 = 86_400;
const DEFAULT_LOOKUP_WORKERS: u64 = 10;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

/// Runtime engine settings (env-driven)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database file override; the platform data dir is used when unset.
    pub db_path: Option<PathBuf>,
    /// Address the subnet resolver routes toward (no packet is sent).
    pub probe_target: String,
    /// Hard deadline for collecting ARP replies, one window per cycle.
    pub arp_timeout: Duration,
    /// Reverse-DNS result age before a refresh is due.
    pub hostname_ttl: Duration,
    /// Vendor-lookup result age before a refresh is due.
    pub vendor_ttl: Duration,
    /// Width of the enrichment worker pool (caps outbound DNS/HTTP).
    pub lookup_workers: usize,
    /// Per-lookup timeout for DNS and vendor HTTP calls.
    pub lookup_timeout: Duration,
    /// Interval between periodic reconciliation cycles.
    pub scan_interval: Duration,
    /// MAC-to-vendor lookup service base URL.
    pub vendor_endpoint: String,
    /// Host pinged by the health scorer's latency probe.
    pub latency_target: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: env_var("NETVIEW_DB_PATH").map(PathBuf::from),
            probe_target: env_var("NETVIEW_PROBE_TARGET")
                .unwrap_or_else(|| DEFAULT_PROBE_TARGET.to_string()),
            arp_timeout: Duration::from_millis(env_parse_u64(
                "NETVIEW_ARP_TIMEOUT_MS",
                DEFAULT_ARP_TIMEOUT_MS,
                200,
                30_000,
            )),
            hostname_ttl: Duration::from_secs(env_parse_u64(
                "NETVIEW_HOSTNAME_TTL_SECS",
                DEFAULT_HOSTNAME_TTL_SECS,
                60,
                604_800,
            )),
            vendor_ttl: Duration::from_secs(env_parse_u64(
                "NETVIEW_VENDOR_TTL_SECS",
                DEFAULT_VENDOR_TTL_SECS,
                60,
                2_592_000,
            )),
            lookup_workers: env_parse_u64("NETVIEW_LOOKUP_WORKERS", DEFAULT_LOOKUP_WORKERS, 1, 64)
                as usize,
            lookup_timeout: Duration::from_millis(env_parse_u64(
                "NETVIEW_LOOKUP_TIMEOUT_MS",
                DEFAULT_LOOKUP_TIMEOUT_MS,
                200,
                30_000,
            )),
            scan_interval: Duration::from_secs(env_parse_u64(
                "NETVIEW_SCAN_INTERVAL_SECS",
                DEFAULT_SCAN_INTERVAL_SECS,
                5,
                3600,
            )),
            vendor_endpoint: env_var("NETVIEW_VENDOR_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_VENDOR_ENDPOINT.to_string()),
            latency_target: env_var("NETVIEW_LATENCY_TARGET")
                .unwrap_or_else(|| DEFAULT_LATENCY_TARGET.to_string()),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(value) => value.clamp(min, max),
        None => default,
    }
}

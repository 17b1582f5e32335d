//! NetView Core Engine — Subnet Discovery, Reconciliation & Health Monitoring
//!
//! This crate provides the discovery engine behind NetView:
//! - Outbound-route subnet detection
//! - Active ARP sweeps for Layer 2 discovery
//! - A device registry persisted in SQLite, keyed by MAC
//! - TTL-gated hostname/vendor enrichment on a bounded worker pool
//! - Deduplicated state-change alerts (new / back online / offline)
//! - Coarse network-health scoring

pub mod config;
pub mod database;
pub mod engine;
pub mod enrich;
pub mod health;
pub mod logging;
pub mod models;
pub mod network;
pub mod scanner;

pub use config::EngineConfig;
pub use database::{AlertRecord, AlertType, Database, DeviceRecord};
pub use engine::{apply_sweep, ReconciliationEngine};
pub use enrich::{enrich_observed, needs_refresh, LookupPlan};
pub use health::{compute_health, read_io_counters, score_network, HealthReport};
pub use models::{device_label, normalize_mac, Enrichment, InterfaceInfo};
pub use network::{
    find_interface_for_ip, is_special_address, resolve_hostname, resolve_local_subnet,
    reverse_lookup, sweep_targets, LocalNet,
};
pub use scanner::{arp_sweep, measure_latency};

// Re-export logging macros for use across crate
pub use crate::logging::macros;

//! Reconciliation engine
//!
//! Orchestrates one discovery pass: snapshot the registry, resolve the
//! subnet, sweep it, enrich the observations, then diff against the prior
//! snapshot and persist the outcome with state-change alerts.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use pnet::util::MacAddr;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;

use crate::config::EngineConfig;
use crate::database::{queries, AlertRecord, AlertType, Database, DeviceRecord};
use crate::enrich::{enrich_observed, LookupPlan};
use crate::models::{device_label, normalize_mac, Enrichment};
use crate::network::{resolve_local_subnet, sweep_targets};
use crate::scanner::arp_sweep;

/// The discovery-reconciliation orchestrator
///
/// Only one cycle may be in flight at a time; a trigger that fires while a
/// cycle is still running is skipped, never run in parallel.
pub struct ReconciliationEngine {
    db: Database,
    config: EngineConfig,
    cycle_gate: tokio::sync::Mutex<()>,
    last_cycle: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl ReconciliationEngine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            db,
            config,
            cycle_gate: tokio::sync::Mutex::new(()),
            last_cycle: std::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// When the last successful cycle completed, if any
    pub fn last_cycle(&self) -> Option<DateTime<Utc>> {
        self.last_cycle.lock().ok().and_then(|guard| *guard)
    }

    /// Cheap snapshot read, no network I/O
    pub fn get_devices(&self) -> Result<Vec<DeviceRecord>> {
        let conn = self.db.connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        queries::get_all_devices(&conn)
    }

    /// Set or clear a device's user-assigned label
    pub fn rename_device(&self, mac: &str, name: &str) -> Result<()> {
        let mac = normalize_mac(mac)?;
        let conn = self.db.connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        queries::rename_device(&conn, &mac, name)
    }

    /// All alerts, newest-first
    pub fn list_alerts(&self) -> Result<Vec<AlertRecord>> {
        let conn = self.db.connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        queries::get_alerts(&conn)
    }

    /// Run one cycle unless the previous one finished inside the scan interval
    ///
    /// The staleness gate is an explicit caller decision, not hidden state:
    /// callers wanting an unconditional pass use `run_cycle` directly.
    pub async fn run_cycle_if_due(&self) -> Result<Vec<DeviceRecord>> {
        if let Some(last) = self.last_cycle() {
            let interval = chrono::Duration::seconds(self.config.scan_interval.as_secs() as i64);
            if Utc::now().signed_duration_since(last) < interval {
                tracing::debug!("Last cycle still fresh; returning snapshot without sweeping");
                return self.get_devices();
            }
        }
        self.run_cycle().await
    }

    /// Trigger one full sweep+enrich+diff+persist pass
    ///
    /// Environment failures (no subnet) and sweep failures degrade to a
    /// no-op cycle returning the prior snapshot. Store failures propagate.
    pub async fn run_cycle(&self) -> Result<Vec<DeviceRecord>> {
        let _cycle = match self.cycle_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Reconciliation cycle already in flight; skipping this trigger");
                return self.get_devices();
            }
        };

        let prior = self.get_devices()?;

        let local = match resolve_local_subnet(&self.config.probe_target) {
            Ok(Some(local)) => local,
            Ok(None) => {
                tracing::warn!("No usable subnet detected; skipping sweep this cycle");
                return Ok(prior);
            }
            Err(e) => {
                tracing::warn!("Subnet detection failed: {:#}; skipping sweep this cycle", e);
                return Ok(prior);
            }
        };

        let (subnet, targets) = match sweep_targets(&local.interface) {
            Ok(expanded) => expanded,
            Err(e) => {
                tracing::warn!("Target expansion failed: {:#}; skipping sweep this cycle", e);
                return Ok(prior);
            }
        };

        let interface = local.interface.clone();
        let arp_timeout = self.config.arp_timeout;
        let sweep = tokio::task::spawn_blocking(move || {
            arp_sweep(&interface, &targets, &subnet, arp_timeout)
        })
        .await;

        let observed = match sweep {
            Ok(Ok(observed)) => observed,
            Ok(Err(e)) => {
                tracing::warn!("ARP sweep failed: {:#}; keeping previous snapshot", e);
                return Ok(prior);
            }
            Err(e) => {
                tracing::warn!("ARP sweep task failed: {}; keeping previous snapshot", e);
                return Ok(prior);
            }
        };

        let seen = normalize_observations(observed);
        let now = Utc::now();

        let known: HashMap<&str, &DeviceRecord> =
            prior.iter().map(|d| (d.mac.as_str(), d)).collect();

        let mut plans: HashMap<String, LookupPlan> = HashMap::new();
        for mac in seen.keys() {
            plans.insert(
                mac.clone(),
                LookupPlan::for_device(known.get(mac.as_str()).copied(), &self.config, now),
            );
        }

        let enrichment = enrich_observed(&seen, &plans, &self.config).await;

        apply_sweep(&self.db, &prior, &seen, &enrichment, now)?;

        if let Ok(mut guard) = self.last_cycle.lock() {
            *guard = Some(now);
        }

        self.get_devices()
    }
}

/// Convert raw sweep output into the normalized `seen` map
///
/// Keyed by normalized MAC. Iteration over the raw map is IP-sorted first
/// so a MAC answering from two addresses resolves deterministically.
fn normalize_observations(observed: HashMap<Ipv4Addr, MacAddr>) -> BTreeMap<String, Ipv4Addr> {
    let mut pairs: Vec<(Ipv4Addr, MacAddr)> = observed.into_iter().collect();
    pairs.sort_by_key(|(ip, _)| *ip);

    let mut seen = BTreeMap::new();
    for (ip, mac) in pairs {
        match normalize_mac(&mac.to_string()) {
            Ok(mac) => {
                seen.insert(mac, ip);
            }
            Err(e) => {
                tracing::warn!("Discarding ARP reply with malformed MAC: {}", e);
            }
        }
    }
    seen
}

/// Apply one sweep's observations to the store and emit alerts
///
/// This is the network-free core of the cycle: a single deterministic pass
/// over `seen` in MAC order, then the bulk offline flip, then offline
/// alerts for everything that vanished. The diff decisions come from the
/// `prior` snapshot taken before the sweep, so a device can never be both
/// "new" and "back online" in the same cycle.
pub fn apply_sweep(
    db: &Database,
    prior: &[DeviceRecord],
    seen: &BTreeMap<String, Ipv4Addr>,
    enrichment: &HashMap<String, Enrichment>,
    now: DateTime<Utc>,
) -> Result<()> {
    let known: HashMap<&str, &DeviceRecord> = prior.iter().map(|d| (d.mac.as_str(), d)).collect();
    let online_before: HashSet<&str> = prior
        .iter()
        .filter(|d| d.online)
        .map(|d| d.mac.as_str())
        .collect();

    let conn = db.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow!("Database connection lock poisoned"))?;

    for (mac, ip) in seen {
        let ip = ip.to_string();
        let extra = enrichment.get(mac);
        let hostname = extra.and_then(|e| e.hostname.as_deref());
        let vendor = extra.and_then(|e| e.vendor.as_deref());

        queries::upsert_device(&conn, mac, &ip, hostname, vendor, now)?;

        match known.get(mac.as_str()) {
            None => {
                let label = hostname.unwrap_or(ip.as_str());
                queries::insert_alert(
                    &conn,
                    AlertType::NewDevice,
                    mac,
                    &ip,
                    &format!("New device detected: {} @ {}", mac, label),
                    now,
                )?;
            }
            Some(prev) if !online_before.contains(mac.as_str()) => {
                let hostname = hostname.or(prev.hostname.as_deref());
                let label = device_label(prev.name.as_deref(), hostname, &ip);
                queries::insert_alert(
                    &conn,
                    AlertType::DeviceBackOnline,
                    mac,
                    &ip,
                    &format!("Device back online: {} @ {}", mac, label),
                    now,
                )?;
            }
            Some(_) => {
                // Already online: timestamp/IP/enrichment refresh only.
            }
        }
    }

    let seen_macs: Vec<&str> = seen.keys().map(String::as_str).collect();
    queries::mark_offline(&conn, &seen_macs)?;

    // `prior` is MAC-ordered, so offline alerts come out in stable order too.
    for device in prior {
        if device.online && !seen.contains_key(&device.mac) {
            let label = device_label(
                device.name.as_deref(),
                device.hostname.as_deref(),
                &device.ip,
            );
            queries::insert_alert(
                &conn,
                AlertType::DeviceOffline,
                &device.mac,
                &device.ip,
                &format!("Device went offline: {} @ {}", device.mac, label),
                now,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_observations_keys_by_lowercase_mac() {
        let mut observed = HashMap::new();
        observed.insert(
            "192.168.1.20".parse().unwrap(),
            MacAddr(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01),
        );
        observed.insert(
            "192.168.1.5".parse().unwrap(),
            MacAddr(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x02),
        );

        let seen = normalize_observations(observed);
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen.get("aa:bb:cc:dd:ee:01"),
            Some(&"192.168.1.20".parse().unwrap())
        );

        // BTreeMap iteration is MAC-ascending regardless of reply order.
        let macs: Vec<&String> = seen.keys().collect();
        assert_eq!(macs, vec!["aa:bb:cc:dd:ee:01", "aa:bb:cc:dd:ee:02"]);
    }

    #[test]
    fn test_normalize_observations_duplicate_mac_resolves_by_highest_ip() {
        let mut observed = HashMap::new();
        let mac = MacAddr(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01);
        observed.insert("192.168.1.20".parse().unwrap(), mac);
        observed.insert("192.168.1.5".parse().unwrap(), mac);

        let seen = normalize_observations(observed);
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen.get("aa:bb:cc:dd:ee:01"),
            Some(&"192.168.1.20".parse().unwrap())
        );
    }
}

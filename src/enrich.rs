//! TTL-gated device enrichment
//!
//! Reverse-DNS and vendor lookups run concurrently on a bounded worker
//! pool. Each task is pure: results are joined back into a map keyed by
//! MAC, and the reconciliation pass consumes them in MAC order so alert
//! output never depends on completion order.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use crate::config::EngineConfig;
use crate::database::DeviceRecord;
use crate::models::Enrichment;
use crate::network::{lookup_vendor, resolve_hostname, vendor_client};

/// Decide whether a cached field is due for a refresh
///
/// True iff the value is absent or the device's last sighting is older
/// than the field's TTL.
pub fn needs_refresh(
    existing: Option<&str>,
    last_seen: Option<DateTime<Utc>>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    if existing.map_or(true, |v| v.is_empty()) {
        return true;
    }

    match last_seen {
        Some(seen) => {
            let age = now.signed_duration_since(seen);
            age > chrono::Duration::seconds(ttl.as_secs() as i64)
        }
        None => true,
    }
}

/// Which lookups one observed device needs this cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupPlan {
    pub hostname: bool,
    pub vendor: bool,
}

impl LookupPlan {
    /// Plan lookups for a device against its stored record (if any)
    pub fn for_device(
        record: Option<&DeviceRecord>,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Self {
        match record {
            None => Self {
                hostname: true,
                vendor: true,
            },
            Some(device) => Self {
                hostname: needs_refresh(
                    device.hostname.as_deref(),
                    Some(device.last_seen),
                    config.hostname_ttl,
                    now,
                ),
                vendor: needs_refresh(
                    device.vendor.as_deref(),
                    Some(device.last_seen),
                    config.vendor_ttl,
                    now,
                ),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.hostname && !self.vendor
    }
}

/// Run the planned lookups for all observed devices concurrently
///
/// Pool width caps outbound DNS/HTTP concurrency. Per-device failures are
/// non-fatal: the field simply stays absent in the result.
pub async fn enrich_observed(
    seen: &BTreeMap<String, Ipv4Addr>,
    plans: &HashMap<String, LookupPlan>,
    config: &EngineConfig,
) -> HashMap<String, Enrichment> {
    let pending: Vec<(String, Ipv4Addr, LookupPlan)> = seen
        .iter()
        .filter_map(|(mac, ip)| {
            let plan = plans.get(mac).copied().unwrap_or_default();
            if plan.is_empty() {
                None
            } else {
                Some((mac.clone(), *ip, plan))
            }
        })
        .collect();

    if pending.is_empty() {
        return HashMap::new();
    }

    tracing::info!("Enriching {} devices...", pending.len());

    let client = match vendor_client(config.lookup_timeout) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("Vendor lookups disabled this cycle: {:#}", e);
            None
        }
    };

    let semaphore = Arc::new(Semaphore::new(config.lookup_workers));
    let results = Arc::new(Mutex::new(HashMap::new()));

    let mut handles = Vec::new();

    for (mac, ip, plan) in pending {
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        let client = client.clone();
        let endpoint = config.vendor_endpoint.clone();
        let lookup_timeout = config.lookup_timeout;

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("Enrichment semaphore acquire failed for {}: {}", mac, e);
                    return;
                }
            };

            let hostname = if plan.hostname {
                resolve_hostname(ip, lookup_timeout).await
            } else {
                None
            };

            let vendor = match (plan.vendor, &client) {
                (true, Some(client)) => lookup_vendor(client, &endpoint, &mac).await,
                _ => None,
            };

            let mut res = results.lock().await;
            res.insert(mac, Enrichment { hostname, vendor });
        });

        handles.push(handle);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!("Enrichment task failed: {}", e);
        }
    }

    let res = results.lock().await;
    tracing::info!("Enrichment complete: {} devices looked up", res.len());

    res.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        "2026-08-07T12:00:00Z".parse().unwrap()
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_absent_value_always_refreshes() {
        assert!(needs_refresh(None, Some(now()), HOUR, now()));
        assert!(needs_refresh(Some(""), Some(now()), HOUR, now()));
        assert!(needs_refresh(None, None, HOUR, now()));
    }

    #[test]
    fn test_fresh_value_is_not_requeried() {
        let seen = now() - ChronoDuration::minutes(30);
        assert!(!needs_refresh(Some("nas.lan"), Some(seen), HOUR, now()));
    }

    #[test]
    fn test_stale_value_is_requeried() {
        let seen = now() - ChronoDuration::hours(2);
        assert!(needs_refresh(Some("nas.lan"), Some(seen), HOUR, now()));
    }

    #[test]
    fn test_unknown_last_seen_refreshes() {
        assert!(needs_refresh(Some("nas.lan"), None, HOUR, now()));
    }

    #[test]
    fn test_plan_for_unknown_device_fetches_everything() {
        let config = EngineConfig::from_env();
        let plan = LookupPlan::for_device(None, &config, now());
        assert!(plan.hostname);
        assert!(plan.vendor);
    }

    #[test]
    fn test_plan_respects_per_field_ttls() {
        let config = EngineConfig::from_env();
        // Seen 2 hours ago: hostname (1h TTL) stale, vendor (24h TTL) fresh.
        let device = DeviceRecord {
            mac: "aa:bb:cc:dd:ee:01".to_string(),
            ip: "192.168.1.10".to_string(),
            online: true,
            first_seen: now() - ChronoDuration::days(3),
            last_seen: now() - ChronoDuration::hours(2),
            name: None,
            hostname: Some("nas.lan".to_string()),
            vendor: Some("Synology".to_string()),
        };

        let plan = LookupPlan::for_device(Some(&device), &config, now());
        assert!(plan.hostname);
        assert!(!plan.vendor);
    }

    #[tokio::test]
    async fn test_enrich_skips_devices_with_empty_plans() {
        let config = EngineConfig::from_env();
        let mut seen = BTreeMap::new();
        seen.insert(
            "aa:bb:cc:dd:ee:01".to_string(),
            "192.168.1.10".parse().unwrap(),
        );

        let mut plans = HashMap::new();
        plans.insert("aa:bb:cc:dd:ee:01".to_string(), LookupPlan::default());

        let results = enrich_observed(&seen, &plans, &config).await;
        assert!(results.is_empty());
    }
}

//! End-to-end reconciliation semantics against an in-memory store.
//!
//! Drives the network-free core of the cycle (`apply_sweep`) with synthetic
//! sweep observations, the same way the scheduler drives it after a real
//! ARP pass.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use chrono::{DateTime, Duration, Utc};

use netview::database::queries;
use netview::{apply_sweep, AlertType, Database, DeviceRecord, Enrichment};

const MAC_A: &str = "aa:bb:cc:dd:ee:01";
const MAC_B: &str = "aa:bb:cc:dd:ee:02";
const MAC_C: &str = "aa:bb:cc:dd:ee:0c";

fn t0() -> DateTime<Utc> {
    "2026-08-07T12:00:00Z".parse().unwrap()
}

fn seen(entries: &[(&str, &str)]) -> BTreeMap<String, Ipv4Addr> {
    entries
        .iter()
        .map(|(mac, ip)| (mac.to_string(), ip.parse().unwrap()))
        .collect()
}

fn snapshot(db: &Database) -> Vec<DeviceRecord> {
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock should not be poisoned");
    queries::get_all_devices(&conn).expect("snapshot query should work")
}

fn seed_online(db: &Database, mac: &str, ip: &str, hostname: Option<&str>, at: DateTime<Utc>) {
    let conn = db.connection();
    let conn = conn.lock().unwrap();
    queries::upsert_device(&conn, mac, ip, hostname, None, at).expect("seed upsert should work");
}

fn alerts_of(db: &Database, alert_type: AlertType) -> Vec<netview::AlertRecord> {
    let conn = db.connection();
    let conn = conn.lock().unwrap();
    queries::get_alerts(&conn)
        .expect("alert query should work")
        .into_iter()
        .filter(|a| a.alert_type == alert_type)
        .collect()
}

#[test]
fn test_device_vanishing_goes_offline_with_one_alert() {
    let db = Database::in_memory().expect("in-memory db should initialize");

    // Prior state: A and B online; B carries a hostname.
    seed_online(&db, MAC_A, "192.168.0.2", None, t0());
    seed_online(&db, MAC_B, "192.168.0.3", Some("printer.lan"), t0());

    let prior = snapshot(&db);
    assert_eq!(prior.len(), 2);

    // Sweep observes only A.
    let now = t0() + Duration::seconds(30);
    apply_sweep(
        &db,
        &prior,
        &seen(&[(MAC_A, "192.168.0.2")]),
        &HashMap::new(),
        now,
    )
    .expect("apply should succeed");

    let after = snapshot(&db);
    assert_eq!(after.len(), 2, "discovery must never delete device rows");

    let a = after.iter().find(|d| d.mac == MAC_A).unwrap();
    let b = after.iter().find(|d| d.mac == MAC_B).unwrap();
    assert!(a.online);
    assert_eq!(a.last_seen, now);
    assert!(!b.online);

    let offline = alerts_of(&db, AlertType::DeviceOffline);
    assert_eq!(offline.len(), 1, "exactly one offline alert for B");
    assert_eq!(offline[0].mac, MAC_B);
    assert_eq!(
        offline[0].message,
        format!("Device went offline: {} @ printer.lan", MAC_B)
    );
    assert_eq!(offline[0].ip.as_deref(), Some("192.168.0.3"));
}

#[test]
fn test_offline_alert_uses_label_precedence() {
    let db = Database::in_memory().unwrap();

    seed_online(&db, MAC_B, "192.168.0.3", Some("printer.lan"), t0());
    {
        let conn = db.connection();
        let conn = conn.lock().unwrap();
        queries::rename_device(&conn, MAC_B, "Basement Printer").unwrap();
    }

    let prior = snapshot(&db);
    apply_sweep(&db, &prior, &BTreeMap::new(), &HashMap::new(), t0() + Duration::seconds(30))
        .unwrap();

    let offline = alerts_of(&db, AlertType::DeviceOffline);
    assert_eq!(offline.len(), 1);
    assert_eq!(
        offline[0].message,
        format!("Device went offline: {} @ Basement Printer", MAC_B),
        "user name must win over hostname"
    );
}

#[test]
fn test_new_device_created_with_alert_and_matching_timestamps() {
    let db = Database::in_memory().unwrap();

    let mut enrichment = HashMap::new();
    enrichment.insert(
        MAC_C.to_string(),
        Enrichment {
            hostname: Some("new-laptop.lan".to_string()),
            vendor: Some("Framework".to_string()),
        },
    );

    apply_sweep(
        &db,
        &[],
        &seen(&[(MAC_C, "192.168.0.5")]),
        &enrichment,
        t0(),
    )
    .unwrap();

    let devices = snapshot(&db);
    assert_eq!(devices.len(), 1);
    let c = &devices[0];
    assert_eq!(c.mac, MAC_C);
    assert!(c.online);
    assert_eq!(c.first_seen, c.last_seen);
    assert_eq!(c.hostname.as_deref(), Some("new-laptop.lan"));
    assert_eq!(c.vendor.as_deref(), Some("Framework"));

    let new_alerts = alerts_of(&db, AlertType::NewDevice);
    assert_eq!(new_alerts.len(), 1);
    assert_eq!(
        new_alerts[0].message,
        format!("New device detected: {} @ new-laptop.lan", MAC_C)
    );
}

#[test]
fn test_new_device_without_hostname_labels_by_ip() {
    let db = Database::in_memory().unwrap();

    apply_sweep(&db, &[], &seen(&[(MAC_C, "192.168.0.5")]), &HashMap::new(), t0()).unwrap();

    let new_alerts = alerts_of(&db, AlertType::NewDevice);
    assert_eq!(new_alerts.len(), 1);
    assert_eq!(
        new_alerts[0].message,
        format!("New device detected: {} @ 192.168.0.5", MAC_C)
    );
}

#[test]
fn test_identical_cycles_are_idempotent() {
    let db = Database::in_memory().unwrap();

    let observations = seen(&[(MAC_C, "192.168.0.5")]);

    apply_sweep(&db, &[], &observations, &HashMap::new(), t0()).unwrap();
    let after_first = snapshot(&db);

    // Second cycle with the identical sweep result, inside the dedup window.
    apply_sweep(
        &db,
        &after_first,
        &observations,
        &HashMap::new(),
        t0() + Duration::seconds(2),
    )
    .unwrap();

    let after_second = snapshot(&db);
    assert_eq!(after_second.len(), 1);
    assert!(after_second[0].online, "online set must stay stable");

    let conn = db.connection();
    let conn = conn.lock().unwrap();
    let alerts = queries::get_alerts(&conn).unwrap();
    assert_eq!(alerts.len(), 1, "no duplicate alerts from identical cycles");
}

#[test]
fn test_flapping_device_back_online_and_dedup() {
    let db = Database::in_memory().unwrap();

    seed_online(&db, MAC_A, "192.168.0.2", Some("desk.lan"), t0());

    // Cycle 1: A vanishes.
    let prior = snapshot(&db);
    apply_sweep(&db, &prior, &BTreeMap::new(), &HashMap::new(), t0() + Duration::seconds(1))
        .unwrap();
    assert_eq!(alerts_of(&db, AlertType::DeviceOffline).len(), 1);

    // Cycle 2: A answers again, so it is back online rather than new.
    let prior = snapshot(&db);
    apply_sweep(
        &db,
        &prior,
        &seen(&[(MAC_A, "192.168.0.2")]),
        &HashMap::new(),
        t0() + Duration::seconds(2),
    )
    .unwrap();

    let back = alerts_of(&db, AlertType::DeviceBackOnline);
    assert_eq!(back.len(), 1);
    assert_eq!(
        back[0].message,
        format!("Device back online: {} @ desk.lan", MAC_A)
    );
    assert!(alerts_of(&db, AlertType::NewDevice).is_empty());

    // Cycle 3: A vanishes again inside the dedup window; alert suppressed.
    let prior = snapshot(&db);
    apply_sweep(&db, &prior, &BTreeMap::new(), &HashMap::new(), t0() + Duration::seconds(3))
        .unwrap();
    assert_eq!(
        alerts_of(&db, AlertType::DeviceOffline).len(),
        1,
        "flap inside the dedup window must not duplicate the offline alert"
    );

    // Well past the window the same transition alerts again.
    let prior = snapshot(&db);
    apply_sweep(
        &db,
        &prior,
        &seen(&[(MAC_A, "192.168.0.2")]),
        &HashMap::new(),
        t0() + Duration::seconds(20),
    )
    .unwrap();
    let prior = snapshot(&db);
    apply_sweep(&db, &prior, &BTreeMap::new(), &HashMap::new(), t0() + Duration::seconds(21))
        .unwrap();
    assert_eq!(alerts_of(&db, AlertType::DeviceOffline).len(), 2);
}

#[test]
fn test_rename_survives_reconciliation() {
    let db = Database::in_memory().unwrap();

    seed_online(&db, MAC_A, "192.168.0.2", None, t0());
    {
        let conn = db.connection();
        let conn = conn.lock().unwrap();
        queries::rename_device(&conn, MAC_A, "Thermostat").unwrap();
    }

    let prior = snapshot(&db);
    apply_sweep(
        &db,
        &prior,
        &seen(&[(MAC_A, "192.168.0.77")]),
        &HashMap::new(),
        t0() + Duration::seconds(30),
    )
    .unwrap();

    let device = snapshot(&db).into_iter().find(|d| d.mac == MAC_A).unwrap();
    assert_eq!(
        device.name.as_deref(),
        Some("Thermostat"),
        "discovery must never touch the user label"
    );
    assert_eq!(device.ip, "192.168.0.77", "IP follows the latest sighting");
}

#[test]
fn test_ip_reassignment_keeps_mac_identity() {
    let db = Database::in_memory().unwrap();

    seed_online(&db, MAC_A, "192.168.0.2", None, t0());

    // DHCP hands A's old address to a different device; A moves.
    let prior = snapshot(&db);
    apply_sweep(
        &db,
        &prior,
        &seen(&[(MAC_A, "192.168.0.9"), (MAC_B, "192.168.0.2")]),
        &HashMap::new(),
        t0() + Duration::seconds(30),
    )
    .unwrap();

    let devices = snapshot(&db);
    assert_eq!(devices.len(), 2, "IP reuse must not merge device identities");

    let new_alerts = alerts_of(&db, AlertType::NewDevice);
    assert_eq!(new_alerts.len(), 1);
    assert_eq!(new_alerts[0].mac, MAC_B);
}

#[test]
fn test_empty_sweep_flips_everything_offline() {
    let db = Database::in_memory().unwrap();

    seed_online(&db, MAC_A, "192.168.0.2", None, t0());
    seed_online(&db, MAC_B, "192.168.0.3", None, t0());

    let prior = snapshot(&db);
    apply_sweep(&db, &prior, &BTreeMap::new(), &HashMap::new(), t0() + Duration::seconds(30))
        .unwrap();

    let devices = snapshot(&db);
    assert_eq!(devices.len(), 2);
    assert!(devices.iter().all(|d| !d.online));
    assert_eq!(alerts_of(&db, AlertType::DeviceOffline).len(), 2);
}

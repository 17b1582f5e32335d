//! Database query functions
//!
//! CRUD operations for the device registry and the alert log

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::*;

/// Identical alerts inside this window are suppressed as duplicates.
const ALERT_DEDUP_WINDOW_SECS: i64 = 5;

/// The alert log retains at most this many rows (oldest evicted first).
const ALERT_RETENTION_ROWS: i64 = 100;

/// Get all devices, MAC-ascending so snapshot consumers iterate deterministically
pub fn get_all_devices(conn: &Connection) -> Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT mac, ip, online, first_seen, last_seen, name, hostname, vendor
        FROM devices
        ORDER BY mac
        "#,
    )?;

    let devices = stmt
        .query_map([], |row| {
            Ok(DeviceRecord {
                mac: row.get(0)?,
                ip: row.get(1)?,
                online: row.get::<_, i32>(2)? == 1,
                first_seen: parse_datetime_column(row.get::<_, String>(3)?, 3)?,
                last_seen: parse_datetime_column(row.get::<_, String>(4)?, 4)?,
                name: row.get(5)?,
                hostname: row.get(6)?,
                vendor: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

/// Get device by MAC address
pub fn get_device_by_mac(conn: &Connection, mac: &str) -> Result<Option<DeviceRecord>> {
    let result = conn.query_row(
        r#"
        SELECT mac, ip, online, first_seen, last_seen, name, hostname, vendor
        FROM devices WHERE mac = ?1
        "#,
        params![mac],
        |row| {
            Ok(DeviceRecord {
                mac: row.get(0)?,
                ip: row.get(1)?,
                online: row.get::<_, i32>(2)? == 1,
                first_seen: parse_datetime_column(row.get::<_, String>(3)?, 3)?,
                last_seen: parse_datetime_column(row.get::<_, String>(4)?, 4)?,
                name: row.get(5)?,
                hostname: row.get(6)?,
                vendor: row.get(7)?,
            })
        },
    );

    match result {
        Ok(device) => Ok(Some(device)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert or update a device sighting
///
/// `first_seen` is written only on insert; `last_seen` is always refreshed.
/// Hostname/vendor keep the stored value when the new one is absent, so a
/// failed enrichment never erases a previously resolved field.
pub fn upsert_device(
    conn: &Connection,
    mac: &str,
    ip: &str,
    hostname: Option<&str>,
    vendor: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let now_str = format_datetime(now);

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM devices WHERE mac = ?1",
            params![mac],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to check for existing device")?;

    if exists.is_some() {
        conn.execute(
            r#"
            UPDATE devices SET
                ip = ?2,
                online = 1,
                last_seen = ?3,
                hostname = COALESCE(?4, hostname),
                vendor = COALESCE(?5, vendor)
            WHERE mac = ?1
            "#,
            params![mac, ip, now_str, hostname, vendor],
        )
        .context("Failed to update device")?;
    } else {
        conn.execute(
            r#"
            INSERT INTO devices (mac, ip, online, first_seen, last_seen, hostname, vendor)
            VALUES (?1, ?2, 1, ?3, ?3, ?4, ?5)
            "#,
            params![mac, ip, now_str, hostname, vendor],
        )
        .context("Failed to insert device")?;
    }

    Ok(())
}

/// Flip every device offline, then the currently-seen set back online
///
/// Two bulk statements so the cost stays O(devices) regardless of churn.
pub fn mark_offline(conn: &Connection, online_macs: &[&str]) -> Result<()> {
    conn.execute("UPDATE devices SET online = 0", [])
        .context("Failed to mark devices offline")?;

    if online_macs.is_empty() {
        return Ok(());
    }

    let placeholders = online_macs
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "UPDATE devices SET online = 1 WHERE mac IN ({})",
        placeholders
    );

    let params: Vec<&dyn rusqlite::ToSql> = online_macs
        .iter()
        .map(|mac| mac as &dyn rusqlite::ToSql)
        .collect();

    conn.execute(&query, params.as_slice())
        .context("Failed to mark seen devices online")?;

    Ok(())
}

/// Set or clear the user-assigned device label (empty clears)
pub fn rename_device(conn: &Connection, mac: &str, name: &str) -> Result<()> {
    let name = if name.is_empty() { None } else { Some(name) };
    conn.execute(
        "UPDATE devices SET name = ?2 WHERE mac = ?1",
        params![mac, name],
    )
    .context("Failed to rename device")?;
    Ok(())
}

/// Insert an alert, suppressing duplicates and enforcing retention
///
/// An identical `(type, mac, message)` within the dedup window is skipped
/// and `None` is returned. After an insert the log is pruned back down to
/// the retention cap, oldest rows first.
pub fn insert_alert(
    conn: &Connection,
    alert_type: AlertType,
    mac: &str,
    ip: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let now_str = format_datetime(now);
    let window_expr = format!("-{} seconds", ALERT_DEDUP_WINDOW_SECS);

    let duplicate: Option<i64> = conn
        .query_row(
            r#"
            SELECT 1 FROM alerts
            WHERE type = ?1
              AND mac = ?2
              AND message = ?3
              AND timestamp > datetime(?4, ?5)
            LIMIT 1
            "#,
            params![alert_type.as_str(), mac, message, now_str, window_expr],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to check for duplicate alert")?;

    if duplicate.is_some() {
        return Ok(None);
    }

    conn.execute(
        r#"
        INSERT INTO alerts (type, mac, ip, timestamp, message)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![alert_type.as_str(), mac, ip, now_str, message],
    )
    .context("Failed to insert alert")?;

    let id = conn.last_insert_rowid();

    conn.execute(
        r#"
        DELETE FROM alerts
        WHERE id NOT IN (
            SELECT id FROM alerts
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
        )
        "#,
        params![ALERT_RETENTION_ROWS],
    )
    .context("Failed to prune alert log")?;

    Ok(Some(id))
}

/// Get all alerts, newest-first
pub fn get_alerts(conn: &Connection) -> Result<Vec<AlertRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, type, mac, ip, timestamp, message
        FROM alerts
        ORDER BY timestamp DESC, id DESC
        "#,
    )?;

    let alerts = stmt
        .query_map([], |row| {
            let alert_type_str: String = row.get(1)?;
            Ok(AlertRecord {
                id: row.get(0)?,
                alert_type: parse_alert_type_or_warn(&alert_type_str),
                mac: row.get(2)?,
                ip: row.get(3)?,
                timestamp: parse_datetime_column(row.get::<_, String>(4)?, 4)?,
                message: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(alerts)
}

/// Helper: format a chrono DateTime as the stored SQLite text form
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_str(&format!("{} +0000", s), "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_alert_type_or_warn(s: &str) -> AlertType {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown alert type in database: {}", s);
            AlertType::NewDevice
        }
    }
}

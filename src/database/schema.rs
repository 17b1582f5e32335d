//! Database schema definitions
//!
//! Creates and manages the SQLite tables

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Devices table: unique devices by MAC address
        CREATE TABLE IF NOT EXISTS devices (
            mac TEXT PRIMARY KEY,
            ip TEXT NOT NULL,
            online INTEGER NOT NULL DEFAULT 0,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL
        );

        -- Alerts table: state-change notifications
        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            mac TEXT NOT NULL,
            ip TEXT,
            timestamp TEXT NOT NULL,
            message TEXT NOT NULL
        );

        -- Indexes for performance
        CREATE INDEX IF NOT EXISTS idx_devices_online ON devices(online);
        CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp);
        CREATE INDEX IF NOT EXISTS idx_alerts_dedupe ON alerts(type, mac, timestamp);
        "#,
    )
    .context("Failed to create database tables")?;

    // The device schema has grown over the system's life (name, then
    // hostname/vendor). Older databases are migrated column-by-column.
    for column in ["name", "hostname", "vendor"] {
        if !table_has_column(conn, "devices", column)? {
            conn.execute(
                &format!("ALTER TABLE devices ADD COLUMN {} TEXT", column),
                [],
            )
            .with_context(|| format!("Failed to migrate devices table with {} column", column))?;
        }
    }

    Ok(())
}

/// Check whether a table already carries a column (for backward-compatible migration)
fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.prepare(&format!("PRAGMA table_info({})", table))
        .and_then(|mut stmt| {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let col_name: String = row.get(1)?;
                if col_name == column {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .with_context(|| format!("Failed to inspect {} table schema", table))
}

/// Drop all tables (for testing/reset)
#[allow(dead_code)]
pub fn drop_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS alerts;
        DROP TABLE IF EXISTS devices;
        "#,
    )
    .context("Failed to drop tables")?;

    Ok(())
}

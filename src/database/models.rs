//! Database models
//!
//! Structs for database records with serialization support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device record from the registry
///
/// MAC is the sole identity; the IP is only the last observed assignment
/// and may be reshuffled by DHCP at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mac: String,
    pub ip: String,
    pub online: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// User-assigned label; only ever touched by an explicit rename.
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
}

/// Alert record from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub mac: String,
    pub ip: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Alert types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewDevice,
    DeviceBackOnline,
    DeviceOffline,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::NewDevice => "new_device",
            AlertType::DeviceBackOnline => "device_back_online",
            AlertType::DeviceOffline => "device_offline",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_device" => Ok(AlertType::NewDevice),
            "device_back_online" => Ok(AlertType::DeviceBackOnline),
            "device_offline" => Ok(AlertType::DeviceOffline),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

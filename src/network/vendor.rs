//! MAC address vendor lookup
//!
//! Queries an external OUI lookup service (macvendors.com API shape) to
//! identify device manufacturers. Lookups are strictly best-effort: any
//! timeout, transport error, or non-200 response yields `None`.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client used for vendor lookups
pub fn vendor_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build vendor lookup HTTP client")
}

/// Look up the vendor/manufacturer for a given MAC address
pub async fn lookup_vendor(client: &Client, endpoint: &str, mac: &str) -> Option<String> {
    let url = format!("{}/{}", endpoint.trim_end_matches('/'), mac);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Vendor lookup for {} failed: {}", mac, e);
            return None;
        }
    };

    if !response.status().is_success() {
        // The service answers 404 for unknown OUIs; treat every non-200 the same.
        tracing::debug!(
            "Vendor lookup for {} returned status {}",
            mac,
            response.status()
        );
        return None;
    }

    match response.text().await {
        Ok(body) => {
            let vendor = body.trim();
            if vendor.is_empty() {
                None
            } else {
                Some(vendor.to_string())
            }
        }
        Err(e) => {
            tracing::debug!("Vendor lookup body for {} unreadable: {}", mac, e);
            None
        }
    }
}

//! Device identity and tunable parameters.
//!
//! Populated by the embedding firmware at bootstrap (device id from the
//! factory MAC, IP from the network stack); defaults are suitable for
//! host-side simulation.

use serde::{Deserialize, Serialize};

/// Identity and timing configuration for one reader device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable device identifier; roots the topic namespace
    /// `devices/{device_id}/…`.
    pub device_id: String,
    /// Firmware version reported in `status_change`.
    pub firmware_version: String,
    /// Network address reported in `status_change`.
    pub ip_address: String,
    /// Seconds between heartbeat publishes.
    pub heartbeat_interval_secs: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "reader-001".to_owned(),
            firmware_version: env!("CARGO_PKG_VERSION").to_owned(),
            ip_address: "0.0.0.0".to_owned(),
            heartbeat_interval_secs: 60,
        }
    }
}

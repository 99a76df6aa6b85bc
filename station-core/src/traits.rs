use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One access point seen during a survey pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub ssid: String,
    /// Signal strength in dBm, typically -100..=-30.
    pub rssi_dbm: i32,
    /// "WPA2", "WPA", "Open" etc.
    pub security: String,
}

/// Diagnostics for the current association, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub ip: Option<String>,
    pub rssi_dbm: Option<i32>,
}

/// The seam over the platform Wi-Fi driver. Everything the station does to
/// the radio goes through this trait; real hardware is behind
/// [`backends::nmcli::NmcliBackend`](crate::backends::nmcli::NmcliBackend),
/// tests use [`backends::mock::MockBackend`](crate::backends::mock::MockBackend).
#[async_trait]
pub trait WifiBackend: Send + Sync {
    /// Power up / initialize the radio.
    async fn enable(&self) -> crate::Result<()>;

    /// Associate with `ssid`. Resolves once the link is up, or errors after
    /// the backend's own timeout.
    async fn connect(&self, ssid: &str, passphrase: &str) -> crate::Result<()>;

    /// Tear down the current association.
    async fn disconnect(&self) -> crate::Result<()>;

    /// Whether the device is currently associated.
    async fn is_connected(&self) -> crate::Result<bool>;

    /// Run one survey pass and return every visible access point.
    async fn scan(&self) -> crate::Result<Vec<Network>>;

    /// Details of the current association.
    async fn link_info(&self) -> crate::Result<LinkInfo>;
}

use crate::traits::{LinkInfo, Network, WifiBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// A mock backend for testing purposes. It simulates scanning and
/// connecting without touching any real hardware; connecting to
/// "flaky-guest" always fails so error paths can be exercised.
#[derive(Debug, Default)]
pub struct MockBackend {
    connected: Mutex<Option<String>>,
    radio_faulted: bool,
}

pub const FAILING_SSID: &str = "flaky-guest";

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose survey and link queries fail, for exercising error
    /// replies without real hardware misbehaving on cue.
    pub fn with_faulted_radio() -> Self {
        Self {
            radio_faulted: true,
            ..Self::default()
        }
    }

    fn fake_networks() -> Vec<Network> {
        vec![
            Network {
                ssid: "MyHomeWiFi".to_string(),
                rssi_dbm: -48,
                security: "WPA3".to_string(),
            },
            Network {
                ssid: "CafeGuest".to_string(),
                rssi_dbm: -61,
                security: "Open".to_string(),
            },
            Network {
                ssid: "Neighbor's Network".to_string(),
                rssi_dbm: -73,
                security: "WPA2".to_string(),
            },
            Network {
                ssid: FAILING_SSID.to_string(),
                rssi_dbm: -56,
                security: "WPA2".to_string(),
            },
            Network {
                ssid: "a-network-name-well-past-the-table-limit".to_string(),
                rssi_dbm: -79,
                security: "WPA2".to_string(),
            },
        ]
    }
}

#[async_trait]
impl WifiBackend for MockBackend {
    async fn enable(&self) -> Result<()> {
        tracing::debug!("[mock] radio enabled");
        Ok(())
    }

    async fn connect(&self, ssid: &str, _passphrase: &str) -> Result<()> {
        // Short simulated association delay.
        sleep(Duration::from_millis(50)).await;
        if ssid == FAILING_SSID {
            return Err(Error::CommandFailed(format!(
                "simulated connection failure to '{}'",
                ssid
            )));
        }
        *self.connected.lock().await = Some(ssid.to_string());
        tracing::debug!(ssid, "[mock] connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.connected.lock().await = None;
        tracing::debug!("[mock] disconnected");
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.connected.lock().await.is_some())
    }

    async fn scan(&self) -> Result<Vec<Network>> {
        if self.radio_faulted {
            return Err(Error::CommandFailed("simulated radio fault".to_string()));
        }
        sleep(Duration::from_millis(20)).await;
        Ok(Self::fake_networks())
    }

    async fn link_info(&self) -> Result<LinkInfo> {
        if self.radio_faulted {
            return Err(Error::CommandFailed("simulated radio fault".to_string()));
        }
        let connected = self.connected.lock().await;
        Ok(match connected.as_ref() {
            Some(ssid) => LinkInfo {
                ssid: Some(ssid.clone()),
                bssid: Some("AA:BB:CC:DD:EE:FF".to_string()),
                ip: Some("192.168.4.17".to_string()),
                rssi_dbm: Some(-48),
            },
            None => LinkInfo::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_flaky_ssid_fails_and_leaves_state_clean() {
        let backend = MockBackend::new();
        assert!(backend.connect(FAILING_SSID, "pw").await.is_err());
        assert!(!backend.is_connected().await.unwrap());

        backend.connect("MyHomeWiFi", "pw").await.unwrap();
        assert!(backend.is_connected().await.unwrap());
        assert_eq!(
            backend.link_info().await.unwrap().ssid.as_deref(),
            Some("MyHomeWiFi")
        );
    }

    #[tokio::test]
    async fn faulted_radio_fails_queries_only() {
        let backend = MockBackend::with_faulted_radio();
        assert!(backend.scan().await.is_err());
        assert!(backend.link_info().await.is_err());
        assert!(backend.enable().await.is_ok());
    }
}

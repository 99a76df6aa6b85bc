use once_cell::sync::Lazy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

/// Runtime configuration for the station.
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// SSID the station joins on startup.
    pub ssid: String,
    pub passphrase: String,
    /// Wireless interface the backend drives.
    pub interface: String,
    /// Where the command center listens for the collector.
    pub bind_addr: SocketAddr,
}

#[derive(Deserialize)]
struct StationConfigFile {
    ssid: String,
    passphrase: String,
    interface: String,
    bind_addr: String,
}

impl TryFrom<StationConfigFile> for StationConfig {
    type Error = crate::Error;

    fn try_from(f: StationConfigFile) -> crate::Result<Self> {
        let bind_addr = SocketAddr::from_str(&f.bind_addr)
            .map_err(|e| crate::Error::CommandFailed(format!("invalid bind_addr: {}", e)))?;
        Ok(StationConfig {
            ssid: f.ssid,
            passphrase: f.passphrase,
            interface: f.interface,
            bind_addr,
        })
    }
}

static EMBEDDED_DEFAULT: Lazy<StationConfig> = Lazy::new(|| {
    const CONFIG_TOML: &str = include_str!("../../configs/station.toml");
    StationConfig::from_toml_str(CONFIG_TOML).expect("embedded station.toml must be valid")
});

impl StationConfig {
    pub fn from_toml_str(s: &str) -> crate::Result<Self> {
        let parsed: StationConfigFile = toml::from_str(s)?;
        Self::try_from(parsed)
    }

    /// The config baked into the binary, used when no file is given.
    pub fn embedded_default() -> Self {
        EMBEDDED_DEFAULT.clone()
    }

    /// Load from a TOML file on disk.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

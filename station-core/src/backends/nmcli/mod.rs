use crate::traits::{LinkInfo, Network, WifiBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

// Backend driving the radio through the `nmcli` command line tool, for
// Linux systems where NetworkManager owns the interface.

const CONNECT_TIMEOUT_SECS: u32 = 20;

#[derive(Debug, Clone)]
pub struct NmcliBackend {
    interface: String,
}

impl NmcliBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    async fn check_connected_to_ssid(&self, ssid: &str) -> Result<bool> {
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("NAME,DEVICE,STATE")
            .arg("connection")
            .arg("show")
            .arg("--active")
            .output()
            .await;
        match output {
            Ok(out) => {
                if !out.status.success() {
                    return Ok(false);
                }
                let stdout = String::from_utf8_lossy(&out.stdout);
                for line in stdout.lines() {
                    let parts = split_terse(line);
                    if parts.len() >= 3
                        && parts[0] == ssid
                        && parts[1] == self.interface
                        && parts[2] == "activated"
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl WifiBackend for NmcliBackend {
    async fn enable(&self) -> Result<()> {
        let output = Command::new("nmcli")
            .arg("radio")
            .arg("wifi")
            .arg("on")
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!(
                "failed to enable radio: {}",
                err
            )));
        }
        Ok(())
    }

    async fn connect(&self, ssid: &str, passphrase: &str) -> Result<()> {
        // Drop whatever the interface is doing and refresh the AP list so
        // nmcli can find the target network.
        let _ = Command::new("nmcli")
            .arg("device")
            .arg("disconnect")
            .arg(&self.interface)
            .status()
            .await;
        let _ = Command::new("nmcli")
            .arg("device")
            .arg("wifi")
            .arg("rescan")
            .status()
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut cmd = Command::new("nmcli");
        cmd.arg("device").arg("wifi").arg("connect").arg(ssid);
        if !passphrase.is_empty() {
            cmd.arg("password").arg(passphrase);
        }
        cmd.arg("ifname").arg(&self.interface);
        cmd.spawn()?;

        for _ in 0..CONNECT_TIMEOUT_SECS {
            if let Ok(true) = self.check_connected_to_ssid(ssid).await {
                tracing::info!(ssid, "association complete");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(Error::CommandFailed(format!(
            "connection to '{}' timed out ({}s)",
            ssid, CONNECT_TIMEOUT_SECS
        )))
    }

    async fn disconnect(&self) -> Result<()> {
        let output = Command::new("nmcli")
            .arg("device")
            .arg("disconnect")
            .arg(&self.interface)
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            // Disconnecting an idle interface is not a failure.
            if !err.contains("not active") {
                return Err(Error::CommandFailed(format!("disconnect failed: {}", err)));
            }
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("STATE")
            .arg("general")
            .output()
            .await;
        match output {
            Ok(out) => {
                if !out.status.success() {
                    return Ok(false);
                }
                let stdout = String::from_utf8_lossy(&out.stdout);
                Ok(parse_general_state(&stdout))
            }
            Err(_) => Ok(false),
        }
    }

    async fn scan(&self) -> Result<Vec<Network>> {
        let _ = Command::new("nmcli")
            .arg("device")
            .arg("wifi")
            .arg("rescan")
            .output()
            .await;
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("SSID,SIGNAL,SECURITY")
            .arg("device")
            .arg("wifi")
            .arg("list")
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!("nmcli scan failed: {}", err)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_scan_list(&stdout))
    }

    async fn link_info(&self) -> Result<LinkInfo> {
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("ACTIVE,SSID,BSSID,SIGNAL")
            .arg("device")
            .arg("wifi")
            .arg("list")
            .arg("ifname")
            .arg(&self.interface)
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!(
                "nmcli wifi list failed: {}",
                err
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut info = parse_active_row(&stdout);

        let ip_output = Command::new("nmcli")
            .arg("-t")
            .arg("-g")
            .arg("IP4.ADDRESS")
            .arg("device")
            .arg("show")
            .arg(&self.interface)
            .output()
            .await?;
        if ip_output.status.success() {
            let stdout = String::from_utf8_lossy(&ip_output.stdout);
            info.ip = parse_ip4_address(&stdout);
        }
        Ok(info)
    }
}

/// Map the SIGNAL percentage nmcli reports back to dBm. Inverse of the
/// usual `(dbm.clamp(-100, -50) + 100) * 2` percentage mapping, so the
/// survey rows carry signed dBm like the rest of the pipeline.
fn percent_to_dbm(percent: i32) -> i32 {
    percent.clamp(0, 100) / 2 - 100
}

/// Split one line of `nmcli -t` output. Terse mode separates fields with
/// ':' and escapes literal colons and backslashes inside values (BSSIDs
/// would be unparseable otherwise).
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_general_state(output: &str) -> bool {
    // `nmcli -t -f STATE general` prints one of: connected, connecting,
    // disconnected, asleep... A plain substring test would match
    // "disconnected" too.
    output
        .lines()
        .next()
        .map(|s| {
            let s = s.trim();
            s == "connected" || s.starts_with("connected ")
        })
        .unwrap_or(false)
}

fn parse_scan_list(output: &str) -> Vec<Network> {
    let mut networks = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_terse(line);
        let ssid = parts.first().cloned().unwrap_or_default();
        if ssid.is_empty() || ssid == "\\x00" {
            continue;
        }
        let percent = parts
            .get(1)
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let security = match parts.get(2).map(|s| s.as_str()) {
            None | Some("") => "Open".to_string(),
            Some(s) => s.to_string(),
        };
        networks.push(Network {
            ssid,
            rssi_dbm: percent_to_dbm(percent),
            security,
        });
    }
    networks
}

fn parse_active_row(output: &str) -> LinkInfo {
    for line in output.lines() {
        let parts = split_terse(line);
        if parts.first().map(|s| s.as_str()) != Some("yes") {
            continue;
        }
        return LinkInfo {
            ssid: parts.get(1).filter(|s| !s.is_empty()).cloned(),
            bssid: parts.get(2).filter(|s| !s.is_empty()).cloned(),
            ip: None,
            rssi_dbm: parts
                .get(3)
                .and_then(|s| s.parse::<i32>().ok())
                .map(percent_to_dbm),
        };
    }
    LinkInfo::default()
}

fn parse_ip4_address(output: &str) -> Option<String> {
    // `-g IP4.ADDRESS` prints e.g. "192.168.1.7/24", one per line.
    output
        .lines()
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.split('/').next().unwrap_or(s).to_string())
}

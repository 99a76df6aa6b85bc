use station_core::command_server::CommandServer;
use station_core::config::StationConfig;
use station_core::traits::WifiBackend;
use std::sync::Arc;

/// Bring the radio up, join the configured network unless something is
/// already associated, then serve the command center until shutdown.
pub async fn run(config: StationConfig, backend: Arc<dyn WifiBackend>) -> anyhow::Result<()> {
    backend.enable().await?;

    if backend.is_connected().await.unwrap_or(false) {
        tracing::info!("already associated, skipping connect");
    } else {
        tracing::info!(ssid = %config.ssid, "joining network");
        // A failed join is not fatal: the command center still starts so
        // the collector can inspect the station and retry later.
        if let Err(e) = backend.connect(&config.ssid, &config.passphrase).await {
            tracing::error!(error = %e, "initial connect failed");
        }
    }

    match backend.link_info().await {
        Ok(info) => tracing::info!(
            ssid = info.ssid.as_deref().unwrap_or("-"),
            ip = info.ip.as_deref().unwrap_or("-"),
            rssi_dbm = info.rssi_dbm,
            "link state"
        ),
        Err(e) => tracing::warn!(error = %e, "could not read link info"),
    }

    let server = CommandServer::bind(config.bind_addr, backend).await?;
    tracing::info!(addr = %server.local_addr()?, "command center listening");
    server.run().await?;
    Ok(())
}

mod runner;

use station_core::config::StationConfig;
use station_core::traits::WifiBackend;
use std::path::Path;
use std::sync::Arc;

// --- Backend selection ---
// Default is the real nmcli backend; `--features backend_mock` swaps in the
// simulator so the daemon can run on a bench machine without a radio.

#[cfg(not(feature = "backend_mock"))]
fn get_backend(config: &StationConfig) -> Arc<dyn WifiBackend> {
    println!("🚀 Using nmcli backend on {}", config.interface);
    use station_core::backends::nmcli::NmcliBackend;
    Arc::new(NmcliBackend::new(config.interface.clone()))
}

#[cfg(feature = "backend_mock")]
fn get_backend(_config: &StationConfig) -> Arc<dyn WifiBackend> {
    println!("🚀 Using mock backend");
    use station_core::backends::mock::MockBackend;
    Arc::new(MockBackend::new())
}

fn load_config() -> anyhow::Result<StationConfig> {
    // Config path from argv, then the STATION_CONFIG env var, otherwise
    // the embedded default.
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("STATION_CONFIG").ok());
    match path {
        Some(p) => {
            tracing::info!(path = %p, "loading config file");
            Ok(StationConfig::from_file(Path::new(&p))?)
        }
        None => {
            tracing::info!("no config given, using embedded default");
            Ok(StationConfig::embedded_default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let backend = get_backend(&config);

    runner::run(config, backend).await
}

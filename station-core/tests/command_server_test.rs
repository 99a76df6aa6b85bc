//! End-to-end tests for the TCP command center, run against a real
//! listening socket with the mock backend behind it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use station_core::backends::mock::MockBackend;
use station_core::command_server::CommandServer;
use station_core::scan::{MAX_NETWORKS, MAX_SSID_LEN};
use station_core::traits::{LinkInfo, Network, WifiBackend};

async fn start_server_with(
    backend: Arc<dyn WifiBackend>,
) -> (SocketAddr, tokio::task::JoinHandle<station_core::Result<()>>) {
    let server = CommandServer::bind("127.0.0.1:0".parse().unwrap(), backend)
        .await
        .expect("bind");
    let addr = server.local_addr().expect("local addr");
    (addr, server.spawn())
}

async fn start_test_server() -> (SocketAddr, tokio::task::JoinHandle<station_core::Result<()>>) {
    start_server_with(Arc::new(MockBackend::new())).await
}

struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        Session {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write");
        let mut reply = String::new();
        timeout(Duration::from_secs(5), self.reader.read_line(&mut reply))
            .await
            .expect("reply timeout")
            .expect("read");
        reply.trim_end().to_string()
    }
}

#[tokio::test]
async fn scan_returns_capped_table() {
    let (addr, handle) = start_test_server().await;
    let mut session = Session::connect(addr).await;

    let reply = session.send("scan").await;
    let rows: Vec<Network> = serde_json::from_str(&reply).expect("valid JSON");
    assert!(rows.len() <= MAX_NETWORKS);
    assert_eq!(rows[0].ssid, "MyHomeWiFi");
    assert_eq!(rows[0].rssi_dbm, -48);
    // The mock's over-long SSID must come back truncated.
    let long = rows
        .iter()
        .find(|r| r.ssid.starts_with("a-network-name"))
        .expect("truncated row present");
    assert_eq!(long.ssid.len(), MAX_SSID_LEN);

    handle.abort();
}

#[tokio::test]
async fn rssi_replays_last_scan_without_rescan() {
    let (addr, handle) = start_test_server().await;
    let mut session = Session::connect(addr).await;

    // Empty before any survey pass.
    assert_eq!(session.send("rssi").await, "[]");

    let scanned = session.send("scan").await;
    let replayed = session.send("rssi").await;
    assert_eq!(scanned, replayed);

    handle.abort();
}

#[tokio::test]
async fn table_survives_reconnect() {
    let (addr, handle) = start_test_server().await;

    let mut first = Session::connect(addr).await;
    let scanned = first.send("scan").await;
    assert_eq!(first.send("quit").await, "bye");

    let mut second = Session::connect(addr).await;
    assert_eq!(second.send("rssi").await, scanned);

    handle.abort();
}

#[tokio::test]
async fn status_and_info_reflect_mock_state() {
    let (addr, handle) = start_test_server().await;
    let mut session = Session::connect(addr).await;

    assert_eq!(session.send("status").await, "disconnected");

    let info: LinkInfo = serde_json::from_str(&session.send("info").await).expect("valid JSON");
    assert_eq!(info, LinkInfo::default());

    handle.abort();
}

#[tokio::test]
async fn unknown_command_keeps_session_alive() {
    let (addr, handle) = start_test_server().await;
    let mut session = Session::connect(addr).await;

    let reply = session.send("reboot").await;
    assert!(reply.starts_with("err "), "got: {reply}");

    // Session still usable afterwards.
    assert_eq!(session.send("status").await, "disconnected");

    handle.abort();
}

#[tokio::test]
async fn backend_errors_become_err_lines_and_session_survives() {
    let (addr, handle) = start_server_with(Arc::new(MockBackend::with_faulted_radio())).await;
    let mut session = Session::connect(addr).await;

    let reply = session.send("scan").await;
    assert!(reply.starts_with("err "), "got: {reply}");
    let reply = session.send("info").await;
    assert!(reply.starts_with("err "), "got: {reply}");

    // The failed scan left the table untouched and the session usable.
    assert_eq!(session.send("rssi").await, "[]");
    assert_eq!(session.send("status").await, "disconnected");
    assert_eq!(session.send("quit").await, "bye");

    handle.abort();
}

#[tokio::test]
async fn rtt_probes_against_live_server() {
    let (addr, handle) = start_test_server().await;

    let stats = station_core::rtt::run_probes(addr, 5, Duration::from_secs(2))
        .await
        .expect("rtt run");
    assert_eq!(stats.sent, 5);
    assert_eq!(stats.received, 5);
    assert_eq!(stats.loss(), 0);
    assert!(stats.min.is_some() && stats.mean.is_some());

    handle.abort();
}

#[tokio::test]
async fn rtt_mode_returns_to_command_mode() {
    let (addr, handle) = start_test_server().await;
    let mut session = Session::connect(addr).await;

    // Entering echo mode produces no acknowledgement; the first reply is
    // the first echo.
    session.writer.write_all(b"rtt 2\n").await.expect("write");
    assert_eq!(session.send("ping-0").await, "ping-0");
    assert_eq!(session.send("ping-1").await, "ping-1");
    // Back in command mode.
    assert_eq!(session.send("status").await, "disconnected");

    handle.abort();
}

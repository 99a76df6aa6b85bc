//! TCP command center the collector peer talks to.
//!
//! One client session at a time, line-oriented: the peer sends a command
//! line, the station answers with one line (JSON for data-carrying
//! replies). `rtt <n>` switches the session into echo mode for the next
//! `n` lines so the peer can time round trips.

use crate::scan::RssiTable;
use crate::traits::WifiBackend;
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Upper bound on `rtt <n>` so a peer cannot park the session in echo
/// mode indefinitely.
pub const MAX_RTT_PROBES: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a survey pass, refill the table, reply with its rows.
    Scan,
    /// Reply with the last filled table, no rescan.
    Rssi,
    /// Reply with the current association details.
    Info,
    /// Reply `connected` or `disconnected`.
    Status,
    /// Echo the next `n` lines back to the peer.
    Rtt(u32),
    /// End the session.
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let verb = words
        .next()
        .ok_or_else(|| Error::Protocol("empty command".to_string()))?;
    let cmd = match verb {
        "scan" => Command::Scan,
        "rssi" => Command::Rssi,
        "info" => Command::Info,
        "status" => Command::Status,
        "quit" => Command::Quit,
        "rtt" => {
            let n = words
                .next()
                .ok_or_else(|| Error::Protocol("rtt takes a probe count".to_string()))?
                .parse::<u32>()
                .map_err(|_| Error::Protocol("rtt takes a probe count".to_string()))?;
            if n == 0 || n > MAX_RTT_PROBES {
                return Err(Error::Protocol(format!(
                    "rtt probe count must be 1..={}",
                    MAX_RTT_PROBES
                )));
            }
            Command::Rtt(n)
        }
        other => {
            return Err(Error::Protocol(format!("unknown command: {}", other)));
        }
    };
    if words.next().is_some() {
        return Err(Error::Protocol(format!(
            "trailing arguments after '{}'",
            verb
        )));
    }
    Ok(cmd)
}

pub struct CommandServer {
    backend: Arc<dyn WifiBackend>,
    listener: TcpListener,
    table: Arc<Mutex<RssiTable>>,
}

impl CommandServer {
    /// Bind the listening socket. Separate from [`run`](Self::run) so the
    /// daemon can log the bound address (and tests can bind port 0).
    pub async fn bind(addr: SocketAddr, backend: Arc<dyn WifiBackend>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            backend,
            listener,
            table: Arc::new(Mutex::new(RssiTable::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Sessions are handled one at a time; the table outlives
    /// sessions, so a reconnecting collector can still `rssi` the previous
    /// survey.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!(%peer, "collector connected");
            let backend = Arc::clone(&self.backend);
            let table = Arc::clone(&self.table);
            if let Err(e) = handle_session(stream, backend, table).await {
                tracing::warn!(%peer, error = %e, "session ended with error");
            } else {
                tracing::info!(%peer, "collector disconnected");
            }
        }
    }

    /// Spawn the accept loop onto the runtime.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

async fn handle_session(
    stream: TcpStream,
    backend: Arc<dyn WifiBackend>,
    table: Arc<Mutex<RssiTable>>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            // Peer closed the connection.
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let cmd = match parse_command(trimmed) {
            Ok(cmd) => cmd,
            Err(e) => {
                send_line(&mut write_half, &format!("err {}", e)).await?;
                continue;
            }
        };
        tracing::debug!(?cmd, "handling command");
        match cmd {
            Command::Scan => {
                let reply = match backend.scan().await {
                    Ok(rows) => {
                        let mut table = table.lock().await;
                        table.fill(rows);
                        match table.to_json() {
                            Ok(json) => json,
                            Err(e) => format!("err {}", e),
                        }
                    }
                    Err(e) => format!("err {}", e),
                };
                send_line(&mut write_half, &reply).await?;
            }
            Command::Rssi => {
                let json = table.lock().await.to_json()?;
                send_line(&mut write_half, &json).await?;
            }
            Command::Info => {
                let reply = match backend.link_info().await {
                    Ok(info) => serde_json::to_string(&info)?,
                    Err(e) => format!("err {}", e),
                };
                send_line(&mut write_half, &reply).await?;
            }
            Command::Status => {
                let connected = backend.is_connected().await.unwrap_or(false);
                let reply = if connected { "connected" } else { "disconnected" };
                send_line(&mut write_half, reply).await?;
            }
            Command::Rtt(n) => {
                echo_probes(&mut reader, &mut write_half, n).await?;
            }
            Command::Quit => {
                send_line(&mut write_half, "bye").await?;
                return Ok(());
            }
        }
    }
}

/// Server half of the round-trip test: echo the next `n` lines verbatim.
async fn echo_probes(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    n: u32,
) -> Result<()> {
    let mut line = String::new();
    for _ in 0..n {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        send_line(writer, line.trim_end_matches('\n')).await?;
    }
    Ok(())
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, reply: &str) -> Result<()> {
    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

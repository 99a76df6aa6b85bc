//! Client half of the round-trip test: fire sequence-numbered probe lines
//! at a command center in echo mode and time each echo.

use crate::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RttStats {
    pub sent: u32,
    pub received: u32,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub mean: Option<Duration>,
}

impl RttStats {
    /// Aggregate per-probe round trips. `sent - samples.len()` probes were
    /// lost (timed out or came back mangled).
    pub fn from_samples(sent: u32, samples: &[Duration]) -> Self {
        let received = samples.len() as u32;
        let min = samples.iter().min().copied();
        let max = samples.iter().max().copied();
        let mean = if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<Duration>() / received)
        };
        Self {
            sent,
            received,
            min,
            max,
            mean,
        }
    }

    pub fn loss(&self) -> u32 {
        self.sent - self.received
    }
}

/// Connect to a peer command center at `addr` and run `count` echo probes,
/// each bounded by `probe_timeout`.
pub async fn run_probes(
    addr: SocketAddr,
    count: u32,
    probe_timeout: Duration,
) -> Result<RttStats> {
    if count == 0 {
        return Err(Error::Protocol("probe count must be nonzero".to_string()));
    }
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(format!("rtt {}\n", count).as_bytes())
        .await?;
    write_half.flush().await?;

    let mut samples = Vec::with_capacity(count as usize);
    let mut echo = String::new();
    'probes: for seq in 0..count {
        let probe = format!("probe {}\n", seq);
        let start = Instant::now();
        write_half.write_all(probe.as_bytes()).await?;
        write_half.flush().await?;

        // A probe whose echo arrives after its deadline is written off, but
        // its echo is still in the stream. Match echoes by sequence number
        // and drain anything older than the current probe, so one slow echo
        // cannot shift every later read off by one.
        let deadline = start + probe_timeout;
        loop {
            echo.clear();
            match timeout_at(deadline, reader.read_line(&mut echo)).await {
                Ok(Ok(0)) => break 'probes, // peer hung up, remaining probes are lost
                Ok(Ok(_)) => match parse_probe_seq(&echo) {
                    Some(s) if s == seq => {
                        samples.push(start.elapsed());
                        break;
                    }
                    Some(s) if s < seq => {
                        tracing::debug!(seq, stale = s, "drained late echo");
                    }
                    _ => {
                        tracing::warn!(seq, echo = %echo.trim_end(), "mismatched echo");
                    }
                },
                Ok(Err(e)) => return Err(Error::Io(e)),
                Err(_) => {
                    tracing::warn!(seq, "probe timed out");
                    break;
                }
            }
        }
    }
    Ok(RttStats::from_samples(count, &samples))
}

/// Sequence number of an echoed `probe {seq}` line.
fn parse_probe_seq(line: &str) -> Option<u32> {
    line.trim_end().strip_prefix("probe ")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stats_over_samples() {
        let samples = [
            Duration::from_millis(2),
            Duration::from_millis(4),
            Duration::from_millis(9),
        ];
        let stats = RttStats::from_samples(4, &samples);
        assert_eq!(stats.sent, 4);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.loss(), 1);
        assert_eq!(stats.min, Some(Duration::from_millis(2)));
        assert_eq!(stats.max, Some(Duration::from_millis(9)));
        assert_eq!(stats.mean, Some(Duration::from_millis(5)));
    }

    #[test]
    fn stats_with_no_echoes() {
        let stats = RttStats::from_samples(5, &[]);
        assert_eq!(stats.received, 0);
        assert_eq!(stats.loss(), 5);
        assert_eq!(stats.min, None);
        assert_eq!(stats.mean, None);
    }

    #[test]
    fn probe_seq_parsing() {
        assert_eq!(parse_probe_seq("probe 7\n"), Some(7));
        assert_eq!(parse_probe_seq("probe 0"), Some(0));
        assert_eq!(parse_probe_seq("probe x"), None);
        assert_eq!(parse_probe_seq("pong 3"), None);
    }

    #[tokio::test]
    async fn resynchronizes_after_late_echo() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        // Echo server that sits on probe 0's echo and only flushes it once
        // probe 1 has arrived: probe 0 must be written off as lost, but its
        // stale echo must not cost probe 1 or 2 their credit.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "rtt 3");
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "probe 0");
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "probe 1");
            write_half.write_all(b"probe 0\nprobe 1\n").await.unwrap();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "probe 2");
            write_half.write_all(b"probe 2\n").await.unwrap();
        });

        let stats = run_probes(addr, 3, Duration::from_millis(300)).await.unwrap();
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.loss(), 1);
    }
}

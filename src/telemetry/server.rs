//! TCP listener for field hardware reports.
//!
//! One handler task per connection. Frames are newline-delimited text: JSON
//! `{"taken_liters": f, "reported_liters": f}` or the bare `"taken,reported"`
//! pair. Every valid frame is acknowledged with the computed discrepancy;
//! malformed frames get an error reply and are skipped — they never
//! terminate the handler, and a dying handler never stops the listener.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::store::LiveReadingStore;
use crate::error::{Result, TelemetryError};

#[derive(Debug, Deserialize)]
struct ReportFrame {
    #[serde(default)]
    taken_liters: f64,
    #[serde(default)]
    reported_liters: f64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Reply {
    Received { discrepancy: f64 },
    Error { message: &'static str },
}

/// Parse one frame: JSON object first, then the plain comma pair.
fn parse_frame(raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(frame) = serde_json::from_str::<ReportFrame>(raw) {
        return Some((frame.taken_liters, frame.reported_liters));
    }

    let mut parts = raw.split(',');
    let taken = parts.next()?.trim().parse::<f64>().ok()?;
    let reported = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((taken, reported))
}

/// Listener accepting hardware connections until shutdown.
pub struct TelemetryServer {
    bind_addr: String,
    store: Arc<LiveReadingStore>,
}

impl TelemetryServer {
    pub fn new(bind_addr: String, store: Arc<LiveReadingStore>) -> Self {
        Self { bind_addr, store }
    }

    /// Accept loop. Returns when the shutdown signal flips or the listener
    /// socket fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|source| TelemetryError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })?;

        info!(addr = %self.bind_addr, "telemetry listener started");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(TelemetryError::Accept)?;
                    debug!(%peer, "client connected");
                    let store = Arc::clone(&self.store);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, store, shutdown).await;
                        debug!(%peer, "client disconnected");
                    });
                }
                _ = shutdown.changed() => {
                    info!("telemetry listener shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// Per-connection loop: read frames in arrival order, publish, acknowledge.
async fn handle_connection(
    stream: TcpStream,
    store: Arc<LiveReadingStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let peer = stream.peer_addr().ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.changed() => break,
        };

        match line {
            Ok(Some(raw)) => {
                if raw.trim().is_empty() {
                    continue;
                }
                match parse_frame(&raw) {
                    Some((taken, reported)) => {
                        let discrepancy = store.publish(taken, reported, Utc::now());
                        debug!(taken, reported, discrepancy, "report received");
                        send_reply(&mut write_half, &Reply::Received { discrepancy }).await;
                    }
                    None => {
                        warn!(peer = ?peer, frame = %raw, "malformed telemetry frame");
                        send_reply(
                            &mut write_half,
                            &Reply::Error {
                                message: "Invalid data format",
                            },
                        )
                        .await;
                    }
                }
            }
            // Zero-length read: the client hung up.
            Ok(None) => break,
            Err(e) => {
                warn!(peer = ?peer, error = %e, "socket error, closing handler");
                break;
            }
        }
    }

    store.set_connected(false);
}

async fn send_reply(write_half: &mut OwnedWriteHalf, reply: &Reply) {
    // Serialization of these two shapes cannot fail.
    let mut payload = serde_json::to_vec(reply).unwrap_or_default();
    payload.push(b'\n');
    if let Err(e) = write_half.write_all(&payload).await {
        warn!(error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_frame() {
        let parsed = parse_frame(r#"{"taken_liters": 12.5, "reported_liters": 10.0}"#);
        assert_eq!(parsed, Some((12.5, 10.0)));
    }

    #[test]
    fn json_missing_fields_default_to_zero() {
        let parsed = parse_frame(r#"{"taken_liters": 3.0}"#);
        assert_eq!(parsed, Some((3.0, 0.0)));
    }

    #[test]
    fn parses_comma_pair() {
        assert_eq!(parse_frame("12.5, 10.0"), Some((12.5, 10.0)));
        assert_eq!(parse_frame("1,2"), Some((1.0, 2.0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_frame("not a frame"), None);
        assert_eq!(parse_frame("1,2,3"), None);
        assert_eq!(parse_frame("a,b"), None);
        assert_eq!(parse_frame(""), None);
    }

    #[test]
    fn reply_wire_shapes() {
        let ack = serde_json::to_string(&Reply::Received { discrepancy: 2.5 }).unwrap();
        assert_eq!(ack, r#"{"status":"received","discrepancy":2.5}"#);

        let err = serde_json::to_string(&Reply::Error {
            message: "Invalid data format",
        })
        .unwrap();
        assert_eq!(err, r#"{"status":"error","message":"Invalid data format"}"#);
    }
}

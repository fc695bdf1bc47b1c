//! Wire-level tests against a real listener socket.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use brewflow::telemetry::{LiveReadingStore, TelemetryServer};

/// Reserve a local port, then hand it to the server to bind for real.
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("probe bind");
    listener.local_addr().expect("local addr").port()
}

async fn connect(port: u16) -> TcpStream {
    // The server task may not have bound yet; retry briefly.
    for _ in 0..50 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("server never came up on port {port}");
}

async fn read_reply(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).await.expect("read reply");
    serde_json::from_str(&line).expect("reply is JSON")
}

#[tokio::test]
async fn acknowledges_json_and_comma_frames() {
    let port = free_port().await;
    let store = Arc::new(LiveReadingStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = TelemetryServer::new(format!("127.0.0.1:{port}"), Arc::clone(&store));
    let handle = tokio::spawn(server.run(shutdown_rx));

    let stream = connect(port).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(b"{\"taken_liters\": 12.5, \"reported_liters\": 10.0}\n")
        .await
        .expect("send json frame");
    let ack = read_reply(&mut reader).await;
    assert_eq!(ack["status"], "received");
    assert_eq!(ack["discrepancy"].as_f64(), Some(2.5));

    write_half.write_all(b"7.0, 4.0\n").await.expect("send pair");
    let ack = read_reply(&mut reader).await;
    assert_eq!(ack["status"], "received");
    assert_eq!(ack["discrepancy"].as_f64(), Some(3.0));

    let latest = store.latest();
    assert_eq!(latest.taken_liters, 7.0);
    assert_eq!(latest.reported_liters, 4.0);
    assert_eq!(latest.discrepancy, 3.0);
    assert!(latest.connected);

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("join server").expect("clean shutdown");
}

#[tokio::test]
async fn malformed_frames_get_an_error_and_do_not_kill_the_session() {
    let port = free_port().await;
    let store = Arc::new(LiveReadingStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = TelemetryServer::new(format!("127.0.0.1:{port}"), Arc::clone(&store));
    let handle = tokio::spawn(server.run(shutdown_rx));

    let stream = connect(port).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(b"total nonsense\n")
        .await
        .expect("send garbage");
    let reply = read_reply(&mut reader).await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "Invalid data format");

    // The session survives and keeps accepting valid frames.
    write_half.write_all(b"1.0,1.0\n").await.expect("send pair");
    let ack = read_reply(&mut reader).await;
    assert_eq!(ack["status"], "received");
    assert_eq!(ack["discrepancy"].as_f64(), Some(0.0));

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("join server").expect("clean shutdown");
}

#[tokio::test]
async fn disconnect_clears_the_connected_flag() {
    let port = free_port().await;
    let store = Arc::new(LiveReadingStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = TelemetryServer::new(format!("127.0.0.1:{port}"), Arc::clone(&store));
    let handle = tokio::spawn(server.run(shutdown_rx));

    let stream = connect(port).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"5.0,5.0\n").await.expect("send pair");
    let _ = read_reply(&mut reader).await;
    assert!(store.latest().connected);

    drop(write_half);
    drop(reader);

    // The handler notices EOF and flips the flag.
    for _ in 0..50 {
        if !store.latest().connected {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(!store.latest().connected);

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("join server").expect("clean shutdown");
}

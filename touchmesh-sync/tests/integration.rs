//! Integration tests for the reference relay.
//!
//! These tests start a real relay and talk to it over raw WebSocket
//! connections, checking fan-out and disconnect handling frame by frame.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use touchmesh_sync::broadcast::BroadcastGroup;
use touchmesh_sync::protocol::WireMessage;
use touchmesh_sync::relay::{RelayConfig, RelayServer};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Find a free port for testing.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a relay on a free port, return the port and the relay.
async fn start_test_relay(clear_on_disconnect: bool) -> (u16, Arc<RelayServer>) {
    let port = free_port().await;
    let relay = Arc::new(RelayServer::new(RelayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        broadcast_capacity: 64,
        clear_on_disconnect,
    }));
    let server = relay.clone();
    tokio::spawn(async move {
        server.run().await.unwrap();
    });
    // Give relay time to bind
    tokio::time::sleep(Duration::from_millis(50)).await;
    (port, relay)
}

async fn connect(port: u16) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    ws
}

/// Next text frame, skipping control frames.
async fn recv_text(ws: &mut Ws) -> String {
    timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => continue,
                other => panic!("Expected text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for text frame")
}

fn update_frame(client_id: &str) -> String {
    format!(
        r##"{{"type":"touchUpdate","clientId":"{client_id}","color":"#ff0000","touches":[{{"id":1,"x":10,"y":20}}]}}"##
    )
}

#[tokio::test]
async fn test_relay_accepts_connections() {
    let (port, _relay) = start_test_relay(true).await;
    let result = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}")).await;
    assert!(result.is_ok(), "Should connect to relay");
}

#[tokio::test]
async fn test_frames_reach_others_but_not_sender() {
    let (port, relay) = start_test_relay(true).await;
    let mut alice = connect(port).await;
    let mut bob = connect(port).await;
    let mut carol = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frame = update_frame("alice001");
    alice.send(Message::Text(frame.clone().into())).await.unwrap();

    assert_eq!(recv_text(&mut bob).await, frame);
    assert_eq!(recv_text(&mut carol).await, frame);

    // Nothing comes back to the sender.
    let echo = timeout(Duration::from_millis(200), alice.next()).await;
    assert!(echo.is_err(), "Sender should not receive its own frame");

    let stats = relay.stats().await;
    assert_eq!(stats.total_connections, 3);
    assert_eq!(stats.total_frames, 1);
    assert_eq!(stats.total_bytes, frame.len() as u64);
}

#[tokio::test]
async fn test_frames_forwarded_verbatim() {
    let (port, _relay) = start_test_relay(true).await;
    let mut alice = connect(port).await;
    let mut bob = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Unknown kinds and malformed text are not the relay's business.
    for text in [r#"{"type":"hello","clientId":"a","v":2}"#, "not json at all"] {
        alice.send(Message::Text(text.into())).await.unwrap();
        assert_eq!(recv_text(&mut bob).await, text);
    }
}

#[tokio::test]
async fn test_disconnect_synthesizes_clear() {
    let (port, relay) = start_test_relay(true).await;
    let mut alice = connect(port).await;
    let mut bob = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    alice
        .send(Message::Text(update_frame("alice001").into()))
        .await
        .unwrap();
    recv_text(&mut bob).await;

    // Drop without a close handshake, like a crashed tab.
    drop(alice);

    let clear = WireMessage::decode(&recv_text(&mut bob).await).unwrap();
    assert_eq!(clear, WireMessage::clear("alice001"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = relay.stats().await;
    assert_eq!(stats.synthesized_clears, 1);
    assert_eq!(stats.active_connections, 1);
}

#[tokio::test]
async fn test_silent_connection_leaves_no_clear() {
    let (port, relay) = start_test_relay(true).await;
    let lurker = connect(port).await;
    let mut bob = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(lurker);
    let nothing = timeout(Duration::from_millis(200), bob.next()).await;
    assert!(nothing.is_err(), "No clear for a connection that never spoke");
    assert_eq!(relay.stats().await.synthesized_clears, 0);
}

#[tokio::test]
async fn test_stale_connection_does_not_clear_reconnected_user() {
    let (port, relay) = start_test_relay(true).await;
    let mut stale = connect(port).await;
    let mut bob = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    stale
        .send(Message::Text(update_frame("alice001").into()))
        .await
        .unwrap();
    recv_text(&mut bob).await;

    // The same user comes back on a fresh socket before the old one dies.
    let mut fresh = connect(port).await;
    fresh
        .send(Message::Text(update_frame("alice001").into()))
        .await
        .unwrap();
    recv_text(&mut bob).await;

    drop(stale);
    let nothing = timeout(Duration::from_millis(200), bob.next()).await;
    assert!(nothing.is_err(), "alice001 is still live on another connection");
    assert_eq!(relay.stats().await.synthesized_clears, 0);

    // Once the last connection for the user goes, the Clear follows.
    drop(fresh);
    let clear = WireMessage::decode(&recv_text(&mut bob).await).unwrap();
    assert_eq!(clear, WireMessage::clear("alice001"));
}

#[tokio::test]
async fn test_clear_on_disconnect_can_be_disabled() {
    let (port, _relay) = start_test_relay(false).await;
    let mut alice = connect(port).await;
    let mut bob = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    alice
        .send(Message::Text(update_frame("alice001").into()))
        .await
        .unwrap();
    recv_text(&mut bob).await;
    alice.close(None).await.unwrap();

    let nothing = timeout(Duration::from_millis(200), bob.next()).await;
    assert!(nothing.is_err(), "Relay should stay silent");
}

#[tokio::test]
async fn test_ping_pong() {
    let (port, _relay) = start_test_relay(true).await;
    let mut ws = connect(port).await;

    ws.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
    let reply = timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    match reply {
        Some(Ok(Message::Pong(data))) => assert_eq!(&data[..], &[1u8, 2, 3]),
        other => panic!("Expected Pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_until_closes_connections() {
    let port = free_port().await;
    let relay = RelayServer::new(RelayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        ..RelayConfig::default()
    });
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        relay
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = connect(port).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let closed = timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "Connection should be closed on shutdown");

    let result = timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_broadcast_group_high_throughput() {
    let group = BroadcastGroup::new(2048);
    let addr = "127.0.0.1:1".parse().unwrap();

    let mut receivers = Vec::new();
    for _ in 0..100 {
        receivers.push(group.add_peer(addr).await);
    }

    let frame = update_frame("bench001");
    let start = std::time::Instant::now();
    for _ in 0..1000 {
        group.broadcast(0, frame.clone());
    }
    let elapsed = start.elapsed();

    assert!(
        elapsed.as_millis() < 200, // Generous limit for CI
        "1000 broadcasts took {:?}, expected <200ms",
        elapsed
    );

    let stats = group.stats().await;
    assert_eq!(stats.active_peers, 100);
    assert_eq!(stats.frames_sent, 1000);
}

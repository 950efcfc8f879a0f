//! Reference WebSocket relay.
//!
//! ```text
//! Client A ──┐                          ┌──► Client B
//!             ├── BroadcastGroup (fan-out)┤
//! Client C ──┘                          └──► Client D
//! ```
//!
//! The relay is thin. Every text frame received on one
//! connection is forwarded unchanged to every other connection; frames are
//! never echoed back to their sender and never interpreted beyond reading the
//! `clientId`. When a connection that has spoken for a participant goes away,
//! the relay sends a Clear on its behalf so peers do not keep stale contacts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::future::Future;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::broadcast::BroadcastGroup;
use crate::identity::short_id;
use crate::protocol::WireMessage;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Frames buffered per connection before the oldest are skipped
    pub broadcast_capacity: usize,
    /// Send a Clear for a participant whose connection drops
    pub clear_on_disconnect: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            broadcast_capacity: 256,
            clear_on_disconnect: true,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_frames: u64,
    pub total_bytes: u64,
    pub dropped_frames: u64,
    pub synthesized_clears: u64,
}

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    group: Arc<BroadcastGroup>,
    stats: Arc<RwLock<RelayStats>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let group = Arc::new(BroadcastGroup::new(config.broadcast_capacity));
        Self {
            config,
            group,
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Accept connections forever.
    pub async fn run(&self) -> Result<(), BoxError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes, then close every open
    /// connection and return.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay listening on {}", self.config.bind_addr);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    log::debug!("New TCP connection from {addr}");

                    let group = self.group.clone();
                    let stats = self.stats.clone();
                    let config = self.config.clone();
                    let stop_rx = stop_rx.clone();

                    tasks.spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, addr, group, stats, config, stop_rx).await
                        {
                            log::error!("Connection error from {addr}: {e}");
                        }
                    });
                }
                // Reap finished connection tasks so the set does not grow.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                _ = &mut shutdown => break,
            }
        }

        log::info!("Relay shutting down");
        drop(listener);
        let _ = stop_tx.send(true);
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    /// Serve one WebSocket connection until it closes.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        group: Arc<BroadcastGroup>,
        stats: Arc<RwLock<RelayStats>>,
        config: RelayConfig,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Result<(), BoxError> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (conn_id, mut broadcast_rx) = group.add_peer(addr).await;
        log::info!("WebSocket connection {conn_id} established from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let mut client_id: Option<String> = None;

        loop {
            tokio::select! {
                // Incoming WebSocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text = text.as_str().to_owned();
                            {
                                let mut s = stats.write().await;
                                s.total_frames += 1;
                                s.total_bytes += text.len() as u64;
                            }

                            // Only the sender id is read; the frame goes out as-is.
                            if let Ok(Some(id)) = WireMessage::decode(&text)
                                .map(|m| m.client_id().map(str::to_owned))
                            {
                                if client_id.as_deref() != Some(id.as_str()) {
                                    log::debug!("Connection {conn_id} speaks for user {}", short_id(&id));
                                    group.set_client_id(conn_id, &id).await;
                                    client_id = Some(id);
                                }
                            }

                            group.broadcast(conn_id, text);
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                                log::debug!("Pong to {addr} failed: {e}");
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Connection {conn_id} from {addr} closed");
                            break;
                        }

                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        // Binary frames are not part of the protocol.
                        _ => {}
                    }
                }

                // Frames from the other connections
                frame = broadcast_rx.recv() => {
                    match frame {
                        Ok(frame) => {
                            if frame.origin == conn_id {
                                continue;
                            }
                            if let Err(e) = ws_sender.send(Message::Text(frame.text.clone().into())).await {
                                log::debug!("Forward to {addr} failed: {e}");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("Connection {conn_id} lagged by {n} frames");
                            group.record_dropped(n);
                            stats.write().await.dropped_frames += n;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                _ = stop_rx.changed() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        // Cleanup
        group.remove_peer(conn_id).await;
        if config.clear_on_disconnect {
            if let Some(id) = client_id {
                if group.is_spoken_for(&id).await {
                    log::debug!("User {} still connected elsewhere, not clearing", short_id(&id));
                } else {
                    Self::synthesize_clear(&group, &stats, conn_id, &id).await;
                }
            }
        }

        let mut s = stats.write().await;
        s.active_connections = s.active_connections.saturating_sub(1);
        Ok(())
    }

    async fn synthesize_clear(
        group: &BroadcastGroup,
        stats: &RwLock<RelayStats>,
        conn_id: u64,
        client_id: &str,
    ) {
        match WireMessage::clear(client_id).encode() {
            Ok(text) => {
                log::info!("Clearing touches for departed user {}", short_id(client_id));
                group.broadcast(conn_id, text);
                stats.write().await.synthesized_clears += 1;
            }
            Err(e) => log::error!("Failed to encode clear for {client_id}: {e}"),
        }
    }

    /// Snapshot of relay statistics.
    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    /// Fan-out group shared by all connections.
    pub fn group(&self) -> &Arc<BroadcastGroup> {
        &self.group
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.broadcast_capacity, 256);
        assert!(config.clear_on_disconnect);
    }

    #[test]
    fn test_relay_creation() {
        let relay = RelayServer::with_defaults();
        assert_eq!(relay.bind_addr(), "127.0.0.1:9090");
        assert_eq!(relay.group().capacity(), 256);
    }

    #[tokio::test]
    async fn test_relay_stats_initial() {
        let relay = RelayServer::new(RelayConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..RelayConfig::default()
        });
        assert_eq!(relay.stats().await, RelayStats::default());
    }

    #[tokio::test]
    async fn test_run_until_returns_on_shutdown() {
        let relay = RelayServer::new(RelayConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..RelayConfig::default()
        });
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            relay.run_until(async {}),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_synthesized_clear_reaches_group() {
        let group = BroadcastGroup::new(8);
        let stats = RwLock::new(RelayStats::default());
        let (_, mut rx) = group.add_peer("127.0.0.1:1".parse().unwrap()).await;

        RelayServer::synthesize_clear(&group, &stats, 7, "abcd1234").await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.origin, 7);
        assert_eq!(
            WireMessage::decode(&frame.text).unwrap(),
            WireMessage::clear("abcd1234")
        );
        assert_eq!(stats.read().await.synthesized_clears, 1);
    }
}

//! Fan-out of relay frames to every other connection.
//!
//! Uses one tokio broadcast channel for the whole relay. Each connection gets
//! an independent receiver that buffers up to `capacity` frames; a receiver
//! that falls further behind skips the oldest frames and the loss is counted.
//! Skipping is safe here because every Update carries the sender's full state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// A text frame tagged with the connection it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayFrame {
    /// Connection id of the sender. Receivers skip frames with their own id.
    pub origin: u64,
    pub text: String,
}

/// A connection known to the group.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub addr: SocketAddr,
    /// Last participant id seen in a frame from this connection.
    pub client_id: Option<String>,
}

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub active_peers: usize,
}

struct AtomicBroadcastStats {
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

/// The set of connected peers sharing one broadcast channel.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<RelayFrame>>,
    peers: RwLock<HashMap<u64, PeerEntry>>,
    next_id: AtomicU64,
    capacity: usize,
    atomic_stats: AtomicBroadcastStats,
}

impl BroadcastGroup {
    /// Create a group buffering up to `capacity` frames per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            peers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity,
            atomic_stats: AtomicBroadcastStats {
                frames_sent: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
            },
        }
    }

    /// Register a connection. Returns its id and a receiver for frames from
    /// the other connections.
    pub async fn add_peer(&self, addr: SocketAddr) -> (u64, broadcast::Receiver<Arc<RelayFrame>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.sender.subscribe();
        self.peers
            .write()
            .await
            .insert(id, PeerEntry { addr, client_id: None });
        (id, rx)
    }

    /// Unregister a connection, returning what was known about it.
    pub async fn remove_peer(&self, id: u64) -> Option<PeerEntry> {
        self.peers.write().await.remove(&id)
    }

    /// Remember which participant a connection speaks for.
    pub async fn set_client_id(&self, id: u64, client_id: &str) {
        let mut peers = self.peers.write().await;
        if let Some(entry) = peers.get_mut(&id) {
            if entry.client_id.as_deref() != Some(client_id) {
                entry.client_id = Some(client_id.to_string());
            }
        }
    }

    /// Whether any registered connection speaks for `client_id`.
    pub async fn is_spoken_for(&self, client_id: &str) -> bool {
        self.peers
            .read()
            .await
            .values()
            .any(|entry| entry.client_id.as_deref() == Some(client_id))
    }

    /// Send a frame to every subscribed receiver.
    ///
    /// Returns the number of receivers, the sender's own included.
    pub fn broadcast(&self, origin: u64, text: impl Into<String>) -> usize {
        let frame = Arc::new(RelayFrame {
            origin,
            text: text.into(),
        });
        let count = self.sender.send(frame).unwrap_or(0);
        self.atomic_stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Count frames a lagging receiver skipped.
    pub fn record_dropped(&self, n: u64) {
        self.atomic_stats.frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn peer(&self, id: u64) -> Option<PeerEntry> {
        self.peers.read().await.get(&id).cloned()
    }

    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            frames_sent: self.atomic_stats.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.atomic_stats.frames_dropped.load(Ordering::Relaxed),
            active_peers: self.peers.read().await.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

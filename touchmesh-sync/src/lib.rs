//! # touchmesh-sync: Shared-canvas touch synchronization
//!
//! Lets every participant see every other participant's active touch and
//! mouse-drag points in near-real time over a WebSocket relay.
//!
//! ## Architecture
//!
//! ```text
//!  input events                                   other clients
//!       │                                              ▲
//!       ▼                                              │
//! ┌──────────────┐   Update / Clear   ┌────────────┐   │
//! │ LocalContacts│ ─────────────────► │ Connection │ ──┴──► Relay
//! └──────────────┘    (Session)       │  Manager   │ ◄───── (fan-out)
//! ┌──────────────┐                    └─────┬──────┘
//! │ RemoteStore  │ ◄──────────────────────── ┘
//! └──────┬───────┘     JSON text frames
//!        │
//!        ▼
//!  FrameSnapshot ──► build_touch_instances() ──► renderer
//! ```
//!
//! ## Modules
//!
//! - [`identity`] - client id and display color
//! - [`touch`] - contact identifiers and points
//! - [`local`] - this client's active contacts
//! - [`remote`] - every other participant's contacts
//! - [`protocol`] - JSON wire messages
//! - [`connection`] - connect / close / reconnect state machine
//! - [`session`] - top-level context tying the stores to the connection
//! - [`client`] - tokio driver for a session over tokio-tungstenite
//! - [`broadcast`] / [`relay`] - reference relay server
//! - [`render`] - draw-ready circle instances

pub mod identity;
pub mod touch;
pub mod local;
pub mod remote;
pub mod protocol;
pub mod connection;
pub mod input;
pub mod session;
pub mod client;
pub mod broadcast;
pub mod relay;
pub mod render;

// Re-exports for convenience
pub use identity::{Color, Identity};
pub use touch::{ContactId, ContactPoint, TouchSample};
pub use local::{LocalContacts, Removal};
pub use remote::{ParticipantState, RemoteChange, RemoteStore};
pub use protocol::{ProtocolError, WireMessage};
pub use connection::{
    ConnectionManager, ConnectionState, FrameSink, ReconnectTimer, Transition, TransportError,
};
pub use input::InputEvent;
pub use session::{FrameSnapshot, Session, StatusSnapshot, SyncEvent};
pub use client::{ClientConfig, ClientHandle, SyncClient};
pub use broadcast::{BroadcastGroup, BroadcastStats, PeerEntry, RelayFrame};
pub use relay::{RelayConfig, RelayServer, RelayStats};
pub use render::{build_touch_instances, TouchInstance};

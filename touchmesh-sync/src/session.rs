//! The synchronization session: one object owning all client state.
//!
//! A [`Session`] is the top-level context of a client. It owns the identity,
//! the local tracker, the remote store and the connection manager, and it
//! applies the synchronization rules between them:
//!
//! - every local mutation that leaves contacts active emits one Update with
//!   the full local set;
//! - the transition from some contacts to none emits exactly one Clear;
//! - nothing is emitted unless the connection is open, and nothing is
//!   buffered for later;
//! - inbound Updates and Clears replace or remove the sender's remote state,
//!   unknown kinds are ignored and malformed frames are discarded.
//!
//! The session performs no IO. A driver feeds it transport events and frames
//! and drains the [`SyncEvent`]s it queues for observers.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::connection::{ConnectionManager, ConnectionState, FrameSink, Transition, TransportError};
use crate::identity::{short_id, Color, Identity};
use crate::input::InputEvent;
use crate::local::LocalContacts;
use crate::protocol::{ProtocolError, WireMessage};
use crate::remote::{ParticipantState, RemoteChange, RemoteStore};
use crate::render::{build_touch_instances, TouchInstance};
use crate::touch::{ContactId, ContactPoint};

/// Notifications for status observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connection state changed.
    StatusChanged(ConnectionState),
    /// Transport error, reported for visibility only.
    TransportError(String),
    /// A remote participant's contacts were replaced.
    RemoteUpdated {
        participant_id: String,
        touches: usize,
        color: Color,
    },
    /// A remote participant now has no contacts. `color` is the last known
    /// color, if the participant was being tracked.
    RemoteCleared {
        participant_id: String,
        color: Option<Color>,
    },
    /// Number of participants (including this one) with active contacts.
    ActiveCountChanged(usize),
}

/// Status surface for a UI indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub connection: ConnectionState,
    pub connection_label: &'static str,
    pub active_participants: usize,
    pub color_hex: String,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub local: Vec<ContactPoint>,
    pub remote: HashMap<String, ParticipantState>,
    pub status: StatusSnapshot,
}

impl FrameSnapshot {
    /// Draw-ready circles for this frame.
    pub fn instances(&self) -> Vec<TouchInstance> {
        build_touch_instances(&self.local, &self.remote)
    }
}

/// Client synchronization state and rules.
pub struct Session<S> {
    identity: Identity,
    local: LocalContacts,
    remote: RemoteStore,
    connection: ConnectionManager<S>,
    mouse_down: bool,
    active_count: usize,
    events: VecDeque<SyncEvent>,
}

impl<S: FrameSink> Session<S> {
    pub fn new(identity: Identity, reconnect_interval: Duration) -> Self {
        let local = LocalContacts::new(identity.color());
        Self {
            identity,
            local,
            remote: RemoteStore::new(),
            connection: ConnectionManager::new(reconnect_interval),
            mouse_down: false,
            active_count: 0,
            events: VecDeque::new(),
        }
    }

    // ── Local side ──────────────────────────────────────────────

    /// Add or move one contact and sync.
    pub fn upsert(&mut self, id: ContactId, x: f64, y: f64) {
        let was_active = self.local.is_active();
        self.local.upsert(id, x, y);
        self.sync_local(was_active);
    }

    /// End one contact and sync.
    pub fn remove(&mut self, id: &ContactId) {
        let was_active = self.local.is_active();
        self.local.remove(id);
        self.sync_local(was_active);
    }

    /// Apply one host input event.
    pub fn apply_input(&mut self, event: InputEvent) {
        let was_active = self.local.is_active();

        match event {
            InputEvent::TouchStart(samples) => {
                for s in samples {
                    log::debug!("Touch start: ID {} at ({:.0}, {:.0})", s.id, s.x, s.y);
                    self.local.upsert(s.id, s.x, s.y);
                }
            }
            InputEvent::TouchMove(samples) => {
                for s in samples {
                    log::trace!("Touch move: ID {} to ({:.0}, {:.0})", s.id, s.x, s.y);
                    self.local.upsert(s.id, s.x, s.y);
                }
            }
            InputEvent::TouchEnd(ids) | InputEvent::TouchCancel(ids) => {
                for id in &ids {
                    log::debug!("Touch end: ID {id}");
                    self.local.remove(id);
                }
            }
            InputEvent::MouseDown { x, y } => {
                log::debug!("Mouse down at ({x:.0}, {y:.0})");
                self.mouse_down = true;
                self.local.upsert(ContactId::mouse(), x, y);
            }
            InputEvent::MouseMove { x, y } => {
                if self.mouse_down {
                    self.local.upsert(ContactId::mouse(), x, y);
                }
            }
            InputEvent::MouseUp | InputEvent::MouseLeave => {
                if self.mouse_down {
                    log::debug!("Mouse up");
                    self.mouse_down = false;
                    self.local.remove(&ContactId::mouse());
                }
            }
        }

        self.sync_local(was_active);
    }

    /// End every local contact, sending the Clear if any were active.
    pub fn release_all(&mut self) {
        let was_active = self.local.is_active();
        self.mouse_down = false;
        self.local.clear();
        self.sync_local(was_active);
    }

    fn sync_local(&mut self, was_active: bool) {
        if !self.local.take_dirty() {
            return;
        }
        if self.local.is_active() {
            let msg = WireMessage::update(
                self.identity.client_id(),
                self.identity.color(),
                &self.local.snapshot(),
            );
            self.emit(&msg);
        } else if was_active {
            let msg = WireMessage::clear(self.identity.client_id());
            self.emit(&msg);
        }
        self.refresh_active_count();
    }

    fn emit(&mut self, msg: &WireMessage) {
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {}: {e}", msg.kind());
                return;
            }
        };
        match self.connection.send(frame) {
            Ok(true) => log::trace!("Sent {}", msg.kind()),
            Ok(false) => log::trace!("Dropped {} while {}", msg.kind(), self.connection.state()),
            Err(e) => self.on_transport_error(&e),
        }
    }

    // ── Remote side ─────────────────────────────────────────────

    /// Decode and apply one inbound text frame.
    ///
    /// A malformed frame is discarded without touching any state.
    pub fn handle_frame(&mut self, text: &str) -> Result<(), ProtocolError> {
        let msg = WireMessage::decode(text)?;
        self.handle_message(msg);
        Ok(())
    }

    /// Apply one decoded inbound message.
    pub fn handle_message(&mut self, msg: WireMessage) {
        if msg.client_id() == Some(self.identity.client_id()) {
            log::trace!("Ignoring echo of own {}", msg.kind());
            return;
        }

        let change = match msg {
            WireMessage::TouchUpdate {
                client_id,
                color,
                touches,
            } => {
                let change = self.remote.apply_update(&client_id, touches, color);
                (client_id, change)
            }
            WireMessage::ClearTouches { client_id } => {
                let change = self.remote.apply_clear(&client_id);
                (client_id, change)
            }
            WireMessage::Unknown => {
                log::trace!("Ignoring unknown message kind");
                return;
            }
        };

        match change {
            (participant_id, RemoteChange::Stored { touches, color }) => {
                log::debug!(
                    "Update from user {}: {touches} touch(es)",
                    short_id(&participant_id)
                );
                self.events.push_back(SyncEvent::RemoteUpdated {
                    participant_id,
                    touches,
                    color,
                });
            }
            (participant_id, RemoteChange::Cleared { previous }) => {
                log::debug!("User {} cleared touches", short_id(&participant_id));
                self.events.push_back(SyncEvent::RemoteCleared {
                    participant_id,
                    color: previous.map(|p| p.color),
                });
            }
        }
        self.refresh_active_count();
    }

    // ── Connection lifecycle ────────────────────────────────────

    /// The transport handshake completed.
    pub fn on_transport_open(&mut self, sink: S) {
        let t = self.connection.on_open(sink);
        log::info!("Connected to relay");
        self.record_transition(t);
        self.refresh_active_count();
    }

    /// The transport closed, or a connect attempt failed.
    pub fn on_transport_closed(&mut self, now: Instant) {
        if let Some(t) = self.connection.on_close(now) {
            log::info!("Disconnected from relay");
            self.record_transition(t);
        }
    }

    /// The transport reported an error. No state change; a close follows if
    /// the connection is lost.
    pub fn on_transport_error(&mut self, err: &TransportError) {
        log::error!("Transport error: {err}");
        self.events
            .push_back(SyncEvent::TransportError(err.to_string()));
    }

    /// The reconnect timer fired. Returns `true` if a new connection attempt
    /// should start.
    pub fn on_reconnect_timer(&mut self, now: Instant) -> bool {
        match self.connection.on_timer(now) {
            Some(t) => {
                log::info!("Attempting to reconnect...");
                self.record_transition(t);
                true
            }
            None => false,
        }
    }

    fn record_transition(&mut self, t: Transition) {
        if t.from != t.to {
            self.events.push_back(SyncEvent::StatusChanged(t.to));
        }
    }

    // ── Read side ───────────────────────────────────────────────

    /// Remote participants touching, plus this client if it is touching.
    pub fn active_count(&self) -> usize {
        self.remote.count() + usize::from(self.local.is_active())
    }

    fn refresh_active_count(&mut self) {
        let count = self.active_count();
        if count != self.active_count {
            self.active_count = count;
            self.events.push_back(SyncEvent::ActiveCountChanged(count));
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let connection = self.connection.state();
        StatusSnapshot {
            connection,
            connection_label: connection.label(),
            active_participants: self.active_count(),
            color_hex: self.identity.color().to_hex(),
        }
    }

    pub fn frame_snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            local: self.local.snapshot(),
            remote: self.remote.snapshot_all().clone(),
            status: self.status(),
        }
    }

    /// Take queued observer notifications, oldest first.
    pub fn drain_events(&mut self) -> std::collections::vec_deque::Drain<'_, SyncEvent> {
        self.events.drain(..)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn local(&self) -> &LocalContacts {
        &self.local
    }

    pub fn remote(&self) -> &RemoteStore {
        &self.remote
    }

    pub fn connection(&self) -> &ConnectionManager<S> {
        &self.connection
    }

    pub fn is_mouse_down(&self) -> bool {
        self.mouse_down
    }
}

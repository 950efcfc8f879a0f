//! Connection lifecycle state machine.
//!
//! ```text
//!            open                 transport close
//! Connecting ─────► Open ──────────────────────────► Closed
//!     ▲                                                 │
//!     └──────────── reconnect timer (fixed interval) ───┘
//! ```
//!
//! The manager is sans-IO: the driver reports transport events and the
//! manager decides the state, owns the outbound sink and holds the reconnect
//! timer. There is no terminal state; a closed connection is retried at a
//! fixed interval for as long as the process lives.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Short human label for a status indicator.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Connected",
            ConnectionState::Closed => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Transport-level errors. Reported for visibility, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Connect(String),
    HandshakeTimeout,
    WebSocket(String),
    ChannelClosed,
    ChannelFull,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "Connect failed: {e}"),
            Self::HandshakeTimeout => write!(f, "Handshake timeout"),
            Self::WebSocket(e) => write!(f, "WebSocket error: {e}"),
            Self::ChannelClosed => write!(f, "Outgoing channel closed"),
            Self::ChannelFull => write!(f, "Outgoing channel full"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Write half of an open connection.
pub trait FrameSink {
    fn send_frame(&mut self, frame: String) -> Result<(), TransportError>;
}

/// Collects frames in memory.
impl FrameSink for Vec<String> {
    fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.push(frame);
        Ok(())
    }
}

/// Hands frames to a writer task. A full channel drops the frame.
impl FrameSink for mpsc::Sender<String> {
    fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
        })
    }
}

/// Pending reconnect timer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectTimer {
    pub armed_at: Instant,
    pub deadline: Instant,
}

/// A state change made by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// A pending reconnect timer was cancelled by this transition.
    pub timer_cancelled: bool,
}

/// Owns the single transport connection and its lifecycle.
pub struct ConnectionManager<S> {
    state: ConnectionState,
    sink: Option<S>,
    reconnect: Option<ReconnectTimer>,
    interval: Duration,
    attempts: u64,
}

impl<S: FrameSink> ConnectionManager<S> {
    /// Create a manager that is already connecting (the first attempt starts
    /// immediately at startup).
    pub fn new(interval: Duration) -> Self {
        Self {
            state: ConnectionState::Connecting,
            sink: None,
            reconnect: None,
            interval,
            attempts: 1,
        }
    }

    /// Transport handshake succeeded.
    ///
    /// Cancels the pending reconnect timer, if any.
    pub fn on_open(&mut self, sink: S) -> Transition {
        let from = self.state;
        self.state = ConnectionState::Open;
        self.sink = Some(sink);
        Transition {
            from,
            to: ConnectionState::Open,
            timer_cancelled: self.reconnect.take().is_some(),
        }
    }

    /// Transport reported the connection closed (or a connect attempt failed).
    ///
    /// Arms the reconnect timer unless one is already pending. Returns `None`
    /// if already closed.
    pub fn on_close(&mut self, now: Instant) -> Option<Transition> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        let from = self.state;
        self.state = ConnectionState::Closed;
        self.sink = None;
        if self.reconnect.is_none() {
            self.reconnect = Some(ReconnectTimer {
                armed_at: now,
                deadline: now + self.interval,
            });
        }
        Some(Transition {
            from,
            to: ConnectionState::Closed,
            timer_cancelled: false,
        })
    }

    /// Reconnect timer fired.
    ///
    /// Moves `Closed → Connecting` once the deadline has passed and re-arms
    /// the timer one interval later, so attempts repeat until one succeeds.
    pub fn on_timer(&mut self, now: Instant) -> Option<Transition> {
        if self.state != ConnectionState::Closed || !self.is_reconnect_due(now) {
            return None;
        }
        self.state = ConnectionState::Connecting;
        self.attempts += 1;
        if let Some(timer) = self.reconnect.as_mut() {
            timer.deadline = now + self.interval;
        }
        Some(Transition {
            from: ConnectionState::Closed,
            to: ConnectionState::Connecting,
            timer_cancelled: false,
        })
    }

    /// Send a frame if open; silently drop it otherwise.
    ///
    /// Returns `Ok(true)` if the frame was handed to the transport.
    pub fn send(&mut self, frame: String) -> Result<bool, TransportError> {
        match (self.state, self.sink.as_mut()) {
            (ConnectionState::Open, Some(sink)) => sink.send_frame(frame).map(|_| true),
            _ => Ok(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn reconnect_timer(&self) -> Option<ReconnectTimer> {
        self.reconnect
    }

    /// When the reconnect timer next fires, if armed and closed.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        match self.state {
            ConnectionState::Closed => self.reconnect.map(|t| t.deadline),
            _ => None,
        }
    }

    pub fn is_reconnect_due(&self, now: Instant) -> bool {
        self.reconnect_deadline().is_some_and(|d| now >= d)
    }

    /// Connection attempts started so far, including the first.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }
}

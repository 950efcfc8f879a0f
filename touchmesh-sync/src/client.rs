//! Async WebSocket client driving a [`Session`].
//!
//! One task owns the session and serially multiplexes:
//! - input commands from the [`ClientHandle`]
//! - the pending connect attempt
//! - inbound frames from the WebSocket reader
//! - the reconnect deadline
//!
//! Outbound frames go through a bounded channel to a writer task. A full
//! channel drops the frame; the next Update carries the full state anyway.
//! After every step the task publishes a fresh [`FrameSnapshot`] on a `watch`
//! channel for the renderer and forwards queued [`SyncEvent`]s.

use std::time::{Duration, Instant};
use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::connection::{TransportError, DEFAULT_RECONNECT_INTERVAL};
use crate::identity::Identity;
use crate::input::InputEvent;
use crate::session::{FrameSnapshot, Session, SyncEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture = BoxFuture<'static, Result<WsStream, TransportError>>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay URL (`ws://` or `wss://`)
    pub server_url: String,
    /// Delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Maximum time for one connect + handshake
    pub connect_timeout: Duration,
    /// Outbound frames buffered for the writer task
    pub outgoing_capacity: usize,
    /// Observer events buffered before new ones are dropped
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9090".to_string(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: Duration::from_secs(3),
            outgoing_capacity: 256,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Default config pointing at the given relay URL.
    pub fn with_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Derive the relay URL from the page origin: a page served over `https`
    /// must use `wss`, anything else uses `ws`.
    pub fn for_origin(scheme: &str, host: &str) -> Self {
        let ws = match scheme.trim_end_matches(':').to_ascii_lowercase().as_str() {
            "https" => "wss",
            _ => "ws",
        };
        Self::with_url(format!("{ws}://{host}"))
    }
}

enum Command {
    Input(InputEvent),
    Shutdown,
}

/// Handle to a running client task.
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
    frames: watch::Receiver<FrameSnapshot>,
    identity: Identity,
    task: Option<JoinHandle<()>>,
}

impl ClientHandle {
    /// Queue an input event for the session.
    pub async fn send_input(&self, event: InputEvent) -> Result<(), TransportError> {
        self.commands
            .send(Command::Input(event))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Receiver of the latest frame snapshot, for a per-frame renderer.
    pub fn frames(&self) -> watch::Receiver<FrameSnapshot> {
        self.frames.clone()
    }

    /// Copy of the latest frame snapshot.
    pub fn snapshot(&self) -> FrameSnapshot {
        self.frames.borrow().clone()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Stop the client. Sends a final Clear if this client still has active
    /// contacts and the connection is open, then closes the connection.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Client task failed: {e}");
            }
        }
    }
}

/// The sync client task.
pub struct SyncClient {
    config: ClientConfig,
    session: Session<mpsc::Sender<String>>,
    connecting: Option<ConnectFuture>,
    reader: Option<SplitStream<WsStream>>,
    writer: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Start a client on the current tokio runtime.
    pub fn spawn(config: ClientConfig, identity: Identity) -> ClientHandle {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));

        log::info!(
            "Client {} ({}) connecting to {}",
            identity.short_id(),
            identity.color(),
            config.server_url
        );

        let session = Session::new(identity.clone(), config.reconnect_interval);
        let (frame_tx, frame_rx) = watch::channel(session.frame_snapshot());

        let client = SyncClient {
            connecting: Some(connect(config.server_url.clone(), config.connect_timeout)),
            config,
            session,
            reader: None,
            writer: None,
        };
        let task = tokio::spawn(client.run(command_rx, event_tx, frame_tx));

        ClientHandle {
            commands: command_tx,
            event_rx: Some(event_rx),
            frames: frame_rx,
            identity,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        event_tx: mpsc::Sender<SyncEvent>,
        frame_tx: watch::Sender<FrameSnapshot>,
    ) {
        loop {
            let deadline = self.session.connection().reconnect_deadline();
            let connecting = &mut self.connecting;
            let reader = &mut self.reader;

            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Input(event)) => self.session.apply_input(event),
                        Some(Command::Shutdown) | None => break,
                    }
                }

                // Pending connect attempt
                result = async {
                    match connecting.as_mut() {
                        Some(fut) => fut.await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }

                // Incoming WebSocket message
                msg = async {
                    match reader.as_mut() {
                        Some(reader) => reader.next().await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.on_ws_message(msg);
                }

                // Reconnect timer, armed only while closed
                _ = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d.into()).await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(d) = deadline {
                        if self.session.on_reconnect_timer(Instant::now().max(d)) {
                            self.connecting = Some(connect(
                                self.config.server_url.clone(),
                                self.config.connect_timeout,
                            ));
                        }
                    }
                }
            }

            self.publish(&event_tx, &frame_tx);
        }

        self.finish(&event_tx, &frame_tx).await;
    }

    fn on_connect_result(&mut self, result: Result<WsStream, TransportError>) {
        match result {
            Ok(ws_stream) => {
                let (ws_writer, ws_reader) = ws_stream.split();
                let (out_tx, out_rx) = mpsc::channel(self.config.outgoing_capacity.max(1));
                self.writer = Some(tokio::spawn(write_frames(ws_writer, out_rx)));
                self.reader = Some(ws_reader);
                self.session.on_transport_open(out_tx);
            }
            Err(e) => {
                self.session.on_transport_error(&e);
                self.session.on_transport_closed(Instant::now());
            }
        }
    }

    fn on_ws_message(&mut self, msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>) {
        match msg {
            Some(Ok(Message::Text(text))) => {
                if let Err(e) = self.session.handle_frame(text.as_str()) {
                    log::warn!("Discarding frame: {e}");
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                self.reader = None;
                self.session.on_transport_closed(Instant::now());
            }
            Some(Err(e)) => {
                self.reader = None;
                self.session
                    .on_transport_error(&TransportError::WebSocket(e.to_string()));
                self.session.on_transport_closed(Instant::now());
            }
            // Pings are answered by tungstenite; binary frames are not ours.
            Some(Ok(_)) => {}
        }
    }

    fn publish(&mut self, event_tx: &mpsc::Sender<SyncEvent>, frame_tx: &watch::Sender<FrameSnapshot>) {
        // Snapshot first, so an observer reacting to an event sees its effect.
        frame_tx.send_replace(self.session.frame_snapshot());
        for event in self.session.drain_events() {
            if let Err(mpsc::error::TrySendError::Full(event)) = event_tx.try_send(event) {
                log::trace!("Event channel full, dropping {event:?}");
            }
        }
    }

    async fn finish(mut self, event_tx: &mpsc::Sender<SyncEvent>, frame_tx: &watch::Sender<FrameSnapshot>) {
        self.session.release_all();
        self.publish(event_tx, frame_tx);

        // Dropping the session drops the outbound sender, which lets the
        // writer flush and close the socket.
        let SyncClient { session, reader, writer, .. } = self;
        drop(session);
        drop(reader);
        if let Some(writer) = writer {
            if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
                log::warn!("Writer did not finish in time");
            }
        }
        log::info!("Client stopped");
    }
}

/// Open a WebSocket connection, bounded by `timeout`.
fn connect(url: String, timeout: Duration) -> ConnectFuture {
    async move {
        match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
            Ok(Ok((ws_stream, _response))) => Ok(ws_stream),
            Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
            Err(_) => Err(TransportError::HandshakeTimeout),
        }
    }
    .boxed()
}

/// Writer task: forward the outgoing channel to the WebSocket.
async fn write_frames(mut ws_writer: SplitSink<WsStream, Message>, mut out_rx: mpsc::Receiver<String>) {
    while let Some(frame) = out_rx.recv().await {
        if let Err(e) = ws_writer.send(Message::Text(frame.into())).await {
            log::debug!("WebSocket write failed: {e}");
            return;
        }
    }
    let _ = ws_writer.close().await;
}

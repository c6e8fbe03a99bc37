//! WebSocket client for the relay server.
//!
//! A background thread owns the socket; the UI thread sends commands
//! through a channel and drains events with `poll_events()` each frame,
//! so gesture handling never blocks on the network.

use crate::log::{LogError, LogEvent, LogResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{ChatMessage, Invite, InviteStatus};
use crate::stroke::Stroke;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{connect, Message};
use url::Url;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced to the owning screen.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Connected to the relay.
    Connected,
    /// Disconnected from the relay.
    Disconnected,
    /// Joined a canvas; `history` replays the stored stroke log.
    Joined {
        canvas: String,
        peer_count: usize,
        history: Vec<Stroke>,
    },
    /// A stroke log change (append or clear) on the joined canvas.
    Log(LogEvent),
    /// A chat message was posted to the room.
    Chat(ChatMessage),
    /// An invitation was posted.
    InvitePosted(Invite),
    /// An invitation was settled.
    InviteUpdated { id: String, status: InviteStatus },
    /// A peer joined the canvas.
    PeerJoined { peer_id: String },
    /// A peer left the canvas.
    PeerLeft { peer_id: String },
    /// Error reported by the relay or the transport.
    Error { message: String },
}

/// Commands sent to the socket thread.
enum SocketCommand {
    Send(String),
    Close,
}

/// Relay client backed by a background socket thread.
pub struct RelayClient {
    state: ConnectionState,
    events: Vec<RelayEvent>,
    cmd_tx: Option<Sender<SocketCommand>>,
    event_rx: Option<Receiver<RelayEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl RelayClient {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to a relay server.
    pub fn connect(&mut self, url: &str) -> LogResult<()> {
        if self.cmd_tx.is_some() {
            return Err(LogError::Subscription("already connected".to_string()));
        }

        let parsed = Url::parse(url)
            .map_err(|e| LogError::Subscription(format!("invalid url: {}", e)))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(LogError::Subscription(format!(
                "invalid websocket scheme: {}",
                parsed.scheme()
            )));
        }

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<SocketCommand>();
        let (event_tx, event_rx) = channel::<RelayEvent>();
        let url = url.to_string();

        let handle = thread::spawn(move || socket_loop(&url, &cmd_rx, &event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);

        Ok(())
    }

    /// Disconnect from the relay.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(SocketCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    fn send(&self, msg: &ClientMessage) -> LogResult<()> {
        let json = serde_json::to_string(msg)
            .map_err(|e| LogError::Persistence(format!("encode failed: {}", e)))?;
        match self.cmd_tx {
            Some(ref tx) => tx
                .send(SocketCommand::Send(json))
                .map_err(|e| LogError::Persistence(format!("send failed: {}", e))),
            None => Err(LogError::Persistence("not connected".to_string())),
        }
    }

    // --- Canvas operations ---

    /// Join a canvas; the relay answers with the stored history.
    pub fn join(&self, canvas: &str) -> LogResult<()> {
        self.send(&ClientMessage::Join {
            canvas: canvas.to_string(),
        })
    }

    /// Leave the current canvas.
    pub fn leave(&self) -> LogResult<()> {
        self.send(&ClientMessage::Leave)
    }

    /// Append a completed stroke. One attempt; the echo confirms it.
    pub fn append(&self, stroke: Stroke) -> LogResult<()> {
        self.send(&ClientMessage::Append { stroke })
    }

    /// Erase the joined canvas.
    pub fn clear(&self) -> LogResult<()> {
        self.send(&ClientMessage::Clear)
    }

    // --- Room operations ---

    /// Post a chat message to the joined room.
    pub fn chat(&self, message: ChatMessage) -> LogResult<()> {
        self.send(&ClientMessage::Chat { message })
    }

    /// Post an invitation.
    pub fn invite(&self, invite: Invite) -> LogResult<()> {
        self.send(&ClientMessage::Invite { invite })
    }

    /// Settle an invitation.
    pub fn invite_reply(&self, id: &str, status: InviteStatus) -> LogResult<()> {
        self.send(&ClientMessage::InviteReply {
            id: id.to_string(),
            status,
        })
    }

    // --- Event delivery ---

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<RelayEvent> {
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    RelayEvent::Connected => self.state = ConnectionState::Connected,
                    RelayEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    RelayEvent::Error { .. } => self.state = ConnectionState::Error,
                    _ => {}
                }
                self.events.push(event);
            }
        }
        std::mem::take(&mut self.events)
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn socket_loop(url: &str, cmd_rx: &Receiver<SocketCommand>, event_tx: &Sender<RelayEvent>) {
    log::info!("socket thread: connecting to {}", url);

    let (mut socket, response) = match connect(url) {
        Ok(ok) => ok,
        Err(e) => {
            log::error!("relay connection failed: {}", e);
            let _ = event_tx.send(RelayEvent::Error {
                message: format!("connection failed: {}", e),
            });
            return;
        }
    };

    log::info!("relay connected, status: {}", response.status());
    let _ = event_tx.send(RelayEvent::Connected);

    // Short read timeout keeps the loop responsive to outgoing commands
    // without spinning.
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(SocketCommand::Send(msg)) => {
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("relay send error: {}", e);
                    break;
                }
            }
            Ok(SocketCommand::Close) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match serde_json::from_str::<ServerMessage>(&txt) {
                Ok(msg) => {
                    let _ = event_tx.send(translate(msg));
                }
                Err(e) => log::warn!("unparseable relay message ({}): {}", e, txt),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // Ignore binary, pong
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("relay read error: {}", e);
                break;
            }
        }
    }

    log::info!("socket thread exiting");
    let _ = event_tx.send(RelayEvent::Disconnected);
}

fn translate(msg: ServerMessage) -> RelayEvent {
    match msg {
        ServerMessage::Joined {
            canvas,
            peer_count,
            history,
        } => RelayEvent::Joined {
            canvas,
            peer_count,
            history,
        },
        ServerMessage::StrokeAdded { stroke } => RelayEvent::Log(LogEvent::StrokeAdded(stroke)),
        ServerMessage::Cleared => RelayEvent::Log(LogEvent::Cleared),
        ServerMessage::Chat { message } => RelayEvent::Chat(message),
        ServerMessage::InvitePosted { invite } => RelayEvent::InvitePosted(invite),
        ServerMessage::InviteUpdated { id, status } => RelayEvent::InviteUpdated { id, status },
        ServerMessage::PeerJoined { peer_id } => RelayEvent::PeerJoined { peer_id },
        ServerMessage::PeerLeft { peer_id } => RelayEvent::PeerLeft { peer_id },
        ServerMessage::Error { message } => RelayEvent::Error { message },
    }
}

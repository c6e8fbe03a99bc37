//! Inkroom relay server.
//!
//! Owns the shared state every canvas session reconciles against: a
//! per-canvas append-only stroke log, per-room chat history, and the
//! invite table. Clients join a canvas over WebSocket, receive a replay
//! of the stored history, and then every append in store order.
//!
//! ## Protocol
//!
//! Messages are JSON, tagged by `type`:
//! ```json
//! { "type": "join", "canvas": "room-12345" }
//! { "type": "append", "stroke": { "id": "...", "points": [...] } }
//! { "type": "clear" }
//! ```
//!
//! Stroke appends and clears are broadcast to every subscriber of the
//! canvas, the sender included — clients recognize their own echoes by
//! stroke id. Presence events are the only messages withheld from the
//! peer they describe.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use inkroom_core::protocol::{ClientMessage, ServerMessage};
use inkroom_core::room::{ChatMessage, Invite, InviteStatus};
use inkroom_core::stroke::Stroke;
use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Shared state for one canvas.
struct CanvasState {
    /// Broadcast channel for this canvas. Carries the originating peer id
    /// so presence messages can skip their own subject.
    tx: broadcast::Sender<(String, ServerMessage)>,
    /// Connected peer ids.
    peers: HashSet<String>,
    /// Append-only stroke log, replayed to joiners.
    strokes: Vec<Stroke>,
    /// Chat history, replayed to joiners.
    chat: Vec<ChatMessage>,
}

impl CanvasState {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            strokes: Vec::new(),
            chat: Vec::new(),
        }
    }
}

/// Shared application state.
struct AppState {
    /// Active canvases, keyed by canvas id.
    canvases: DashMap<String, CanvasState>,
    /// Invite table; clients filter broadcasts by receiver.
    invites: Mutex<Vec<Invite>>,
    /// Global channel for invite traffic, independent of any canvas.
    invite_tx: broadcast::Sender<ServerMessage>,
}

impl AppState {
    fn new() -> Self {
        let (invite_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            canvases: DashMap::new(),
            invites: Mutex::new(Vec::new()),
            invite_tx,
        }
    }

    /// Add a peer to a canvas, creating it on first join. Returns the
    /// broadcast receiver, the histories to replay, and the peer count.
    fn join_canvas(
        &self,
        canvas_id: &str,
        peer_id: &str,
    ) -> (
        broadcast::Receiver<(String, ServerMessage)>,
        Vec<Stroke>,
        Vec<ChatMessage>,
        usize,
    ) {
        let mut canvas = self
            .canvases
            .entry(canvas_id.to_string())
            .or_insert_with(CanvasState::new);
        canvas.peers.insert(peer_id.to_string());
        let rx = canvas.tx.subscribe();
        let history = canvas.strokes.clone();
        let chat = canvas.chat.clone();
        let peer_count = canvas.peers.len();
        (rx, history, chat, peer_count)
    }

    /// Remove a peer's presence. The stroke and chat histories outlive
    /// peer churn; only a canvas that never stored anything is dropped.
    fn leave_canvas(&self, canvas_id: &str, peer_id: &str) {
        if let Some(mut canvas) = self.canvases.get_mut(canvas_id) {
            canvas.peers.remove(peer_id);
            if canvas.peers.is_empty() && canvas.strokes.is_empty() && canvas.chat.is_empty() {
                drop(canvas);
                self.canvases.remove(canvas_id);
            }
        }
    }

    /// Append a stroke to the canvas's log and fan it out to every
    /// subscriber, the sender included.
    fn append_stroke(&self, canvas_id: &str, from: &str, stroke: Stroke) {
        if let Some(mut canvas) = self.canvases.get_mut(canvas_id) {
            canvas.strokes.push(stroke.clone());
            let _ = canvas
                .tx
                .send((from.to_string(), ServerMessage::StrokeAdded { stroke }));
        }
    }

    /// Erase a canvas's stroke log. Not undoable.
    fn clear_canvas(&self, canvas_id: &str, from: &str) {
        if let Some(mut canvas) = self.canvases.get_mut(canvas_id) {
            canvas.strokes.clear();
            let _ = canvas.tx.send((from.to_string(), ServerMessage::Cleared));
        }
    }

    /// Store a chat message and fan it out.
    fn post_chat(&self, canvas_id: &str, from: &str, message: ChatMessage) {
        if let Some(mut canvas) = self.canvases.get_mut(canvas_id) {
            canvas.chat.push(message.clone());
            let _ = canvas
                .tx
                .send((from.to_string(), ServerMessage::Chat { message }));
        }
    }

    /// Record an invite and announce it to every connected client.
    fn post_invite(&self, invite: Invite) {
        self.invites.lock().unwrap().push(invite.clone());
        let _ = self.invite_tx.send(ServerMessage::InvitePosted { invite });
    }

    /// Settle a pending invite. Announces the transition if it happened.
    fn settle_invite(&self, id: &str, status: InviteStatus) -> bool {
        let settled = {
            let mut invites = self.invites.lock().unwrap();
            invites.iter_mut().any(|invite| {
                invite.id == id
                    && match status {
                        InviteStatus::Accepted => invite.accept(),
                        InviteStatus::Declined => invite.decline(),
                        InviteStatus::Pending => false,
                    }
            })
        };
        if settled {
            let _ = self.invite_tx.send(ServerMessage::InviteUpdated {
                id: id.to_string(),
                status,
            });
        }
        settled
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3030));
    info!("inkroom relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:3030/ws");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Index page
async fn index() -> &'static str {
    "Inkroom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("new connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_canvas: Option<String> = None;
    let mut canvas_rx: Option<broadcast::Receiver<(String, ServerMessage)>> = None;
    let mut invite_rx = state.invite_tx.subscribe();

    loop {
        tokio::select! {
            // Messages from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if handle_client_message(
                                    client_msg,
                                    &state,
                                    &peer_id,
                                    &mut current_canvas,
                                    &mut canvas_rx,
                                    &mut sender,
                                )
                                .await
                                .is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("invalid message: {}", e),
                                };
                                let _ = sender
                                    .send(Message::Text(serde_json::to_string(&err).unwrap().into()))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("websocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Canvas broadcasts (strokes, clears, chat, presence)
            msg = async {
                match &mut canvas_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => std::future::pending::<Option<(String, ServerMessage)>>().await,
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Presence events skip the peer they describe; log and
                    // chat traffic is echoed back to its sender.
                    let own_presence = from == peer_id
                        && matches!(server_msg, ServerMessage::PeerJoined { .. } | ServerMessage::PeerLeft { .. });
                    if !own_presence {
                        let json = serde_json::to_string(&server_msg).unwrap();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Invite broadcasts reach every connected client
            msg = invite_rx.recv() => {
                if let Ok(server_msg) = msg {
                    let json = serde_json::to_string(&server_msg).unwrap();
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref canvas) = current_canvas {
        state.leave_canvas(canvas, &peer_id);
        broadcast_presence(&state, canvas, &peer_id, false);
    }
    info!("connection closed: {}", peer_id);
}

/// Apply one client message. Returns Err when the connection should close.
async fn handle_client_message(
    msg: ClientMessage,
    state: &Arc<AppState>,
    peer_id: &str,
    current_canvas: &mut Option<String>,
    canvas_rx: &mut Option<broadcast::Receiver<(String, ServerMessage)>>,
    sender: &mut (impl SinkExt<Message> + Unpin),
) -> Result<(), ()> {
    match msg {
        ClientMessage::Join { canvas } => {
            // Leave the current canvas if any
            if let Some(old) = current_canvas.as_deref() {
                state.leave_canvas(old, peer_id);
                broadcast_presence(state, old, peer_id, false);
            }

            let (rx, history, chat, peer_count) = state.join_canvas(&canvas, peer_id);
            *canvas_rx = Some(rx);
            *current_canvas = Some(canvas.clone());

            let joined = ServerMessage::Joined {
                canvas: canvas.clone(),
                peer_count,
                history,
            };
            send_json(sender, &joined).await?;

            // Chat catches up one message at a time, same as live traffic.
            for message in chat {
                send_json(sender, &ServerMessage::Chat { message }).await?;
            }

            broadcast_presence(state, &canvas, peer_id, true);
            info!("peer {} joined canvas {}", peer_id, canvas);
        }
        ClientMessage::Leave => {
            if let Some(canvas) = current_canvas.as_deref() {
                state.leave_canvas(canvas, peer_id);
                broadcast_presence(state, canvas, peer_id, false);
                info!("peer {} left canvas {}", peer_id, canvas);
            }
            *current_canvas = None;
            *canvas_rx = None;
        }
        ClientMessage::Append { stroke } => {
            if let Some(canvas) = current_canvas.as_deref() {
                state.append_stroke(canvas, peer_id, stroke);
            }
        }
        ClientMessage::Clear => {
            if let Some(canvas) = current_canvas.as_deref() {
                state.clear_canvas(canvas, peer_id);
                info!("peer {} cleared canvas {}", peer_id, canvas);
            }
        }
        ClientMessage::Chat { message } => {
            if let Some(canvas) = current_canvas.as_deref() {
                state.post_chat(canvas, peer_id, message);
            }
        }
        ClientMessage::Invite { invite } => {
            info!("invite {} posted for {}", invite.id, invite.receiver);
            state.post_invite(invite);
        }
        ClientMessage::InviteReply { id, status } => {
            if !state.settle_invite(&id, status) {
                let err = ServerMessage::Error {
                    message: format!("invite {} not pending", id),
                };
                send_json(sender, &err).await?;
            }
        }
    }
    Ok(())
}

async fn send_json(
    sender: &mut (impl SinkExt<Message> + Unpin),
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).unwrap();
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn broadcast_presence(state: &AppState, canvas_id: &str, peer_id: &str, joined: bool) {
    if let Some(canvas) = state.canvases.get(canvas_id) {
        let msg = if joined {
            ServerMessage::PeerJoined {
                peer_id: peer_id.to_string(),
            }
        } else {
            ServerMessage::PeerLeft {
                peer_id: peer_id.to_string(),
            }
        };
        let _ = canvas.tx.send((peer_id.to_string(), msg));
    }
}

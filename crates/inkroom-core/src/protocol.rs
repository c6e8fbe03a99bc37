//! Wire protocol between canvas sessions and the relay server.
//!
//! Messages are JSON, discriminated by a `type` tag. The relay owns the
//! per-canvas stroke and chat histories; appends are broadcast back to
//! every subscriber, the sender included, so clients can confirm their
//! optimistically-rendered strokes by id.

use crate::room::{ChatMessage, Invite, InviteStatus};
use crate::stroke::Stroke;
use serde::{Deserialize, Serialize};

/// Messages sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a canvas and receive its stroke history.
    Join { canvas: String },
    /// Leave the current canvas.
    Leave,
    /// Append a completed stroke to the canvas's log.
    Append { stroke: Stroke },
    /// Erase the canvas: drop its whole stroke log.
    Clear,
    /// Post a chat message to the current room.
    Chat { message: ChatMessage },
    /// Post an invitation.
    Invite { invite: Invite },
    /// Settle an invitation.
    InviteReply { id: String, status: InviteStatus },
}

/// Messages received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm a canvas join, replaying the stored stroke history.
    Joined {
        canvas: String,
        peer_count: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        history: Vec<Stroke>,
    },
    /// A stroke was appended by some participant (the recipient included).
    StrokeAdded { stroke: Stroke },
    /// The canvas's stroke log was erased.
    Cleared,
    /// A chat message was posted to the room.
    Chat { message: ChatMessage },
    /// An invitation was posted. Recipients filter by receiver.
    InvitePosted { invite: Invite },
    /// An invitation was settled.
    InviteUpdated { id: String, status: InviteStatus },
    /// A peer joined the canvas.
    PeerJoined { peer_id: String },
    /// A peer left the canvas.
    PeerLeft { peer_id: String },
    /// Error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::BrushColor;
    use kurbo::Point;

    fn stroke() -> Stroke {
        let mut s = Stroke::new(Point::new(0.0, 0.0), BrushColor::Blue, 10.0, 99, "ada");
        s.add_point(Point::new(3.0, 4.0));
        s
    }

    #[test]
    fn test_join_serializes_with_tag() {
        let msg = ClientMessage::Join {
            canvas: "room-12345".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("room-12345"));
    }

    #[test]
    fn test_append_roundtrip() {
        let msg = ClientMessage::Append { stroke: stroke() };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        match back {
            ClientMessage::Append { stroke: s } => {
                assert_eq!(s.points.len(), 2);
                assert_eq!(s.color, BrushColor::Blue);
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_joined_history_omitted_when_empty() {
        let msg = ServerMessage::Joined {
            canvas: "c".to_string(),
            peer_count: 1,
            history: Vec::new(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("history"));

        // And deserializes back to an empty history.
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::Joined { history, .. } => assert!(history.is_empty()),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_invite_reply_deserialize() {
        let json = r#"{"type":"invite_reply","id":"inv-1","status":"accepted"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::InviteReply { id, status } => {
                assert_eq!(id, "inv-1");
                assert_eq!(status, InviteStatus::Accepted);
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_stroke_added_echo_carries_id() {
        let s = stroke();
        let id = s.id;
        let json = serde_json::to_string(&ServerMessage::StrokeAdded { stroke: s }).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::StrokeAdded { stroke } => assert_eq!(stroke.id, id),
            other => panic!("wrong message type: {:?}", other),
        }
    }
}

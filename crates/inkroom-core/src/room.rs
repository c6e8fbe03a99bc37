//! Rooms, chat, and invitations.
//!
//! A room bundles one shared canvas with a chat history and a member
//! roster, reachable through a short join code. Invitations move the
//! code between users; nothing here touches the stroke log itself.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A member of a collaborative room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
}

/// A collaborative room: one canvas, one chat, a member roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    /// Display name of the room's creator.
    pub creator: String,
    pub members: Vec<Member>,
    /// Five-digit join code handed out to invitees.
    pub code: String,
}

impl Room {
    /// Create a room owned by `creator`, who becomes the first member.
    pub fn new(name: impl Into<String>, creator: Member, created_at: u64, seed: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at,
            creator: creator.name.clone(),
            members: vec![creator],
            code: join_code(seed),
        }
    }

    /// Add a member. Idempotent per member id; returns false on a repeat.
    pub fn add_member(&mut self, member: Member) -> bool {
        if self.members.iter().any(|m| m.id == member.id) {
            return false;
        }
        self.members.push(member);
        true
    }

    pub fn is_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m.id == member_id)
    }

    /// Room ownership checks compare display names, as the invite cards do.
    pub fn is_creator(&self, display_name: &str) -> bool {
        self.creator == display_name
    }
}

/// Derive a five-digit join code from a seed.
///
/// Splitmix-style mixing keeps consecutive seeds from producing
/// consecutive codes; the result stays in the 10000..=99999 range the
/// invite cards expect.
pub fn join_code(seed: u64) -> String {
    let mut x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    format!("{}", 10_000 + x % 90_000)
}

/// One chat message in a room's append-only chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub created_at: u64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            content: content.into(),
            created_at,
        }
    }
}

/// Lifecycle of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

/// An invitation to join a room, addressed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub room_code: String,
    pub room_name: String,
    pub sender: String,
    pub receiver: String,
    pub status: InviteStatus,
    pub created_at: u64,
}

impl Invite {
    pub fn new(
        room_code: impl Into<String>,
        room_name: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_code: room_code.into(),
            room_name: room_name.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            status: InviteStatus::Pending,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InviteStatus::Pending
    }

    /// Accept a pending invite. Returns false once settled.
    pub fn accept(&mut self) -> bool {
        self.settle(InviteStatus::Accepted)
    }

    /// Decline a pending invite. Returns false once settled.
    pub fn decline(&mut self) -> bool {
        self.settle(InviteStatus::Declined)
    }

    fn settle(&mut self, status: InviteStatus) -> bool {
        if self.status != InviteStatus::Pending {
            return false;
        }
        self.status = status;
        true
    }
}

/// Surfaces each pending invite for one receiver at most once.
///
/// The already-notified set is owned by the watcher instance, so its
/// lifetime matches the subscription feeding it and teardown never
/// leaks notification state into the next mount.
#[derive(Debug, Clone)]
pub struct InviteWatcher {
    receiver: String,
    notified: HashSet<String>,
}

impl InviteWatcher {
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            notified: HashSet::new(),
        }
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Filter a snapshot of the invite table down to the pending invites
    /// for this receiver that have not been surfaced before. Each id is
    /// returned once across repeated snapshots.
    pub fn fresh<'a>(&mut self, invites: &'a [Invite]) -> Vec<&'a Invite> {
        invites
            .iter()
            .filter(|invite| invite.receiver == self.receiver && invite.is_pending())
            .filter(|invite| self.notified.insert(invite.id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_room_creation() {
        let room = Room::new("sketches", member("u1", "ada"), 1000, 42);
        assert_eq!(room.members.len(), 1);
        assert!(room.is_creator("ada"));
        assert!(!room.is_creator("bea"));
        assert!(room.is_member("u1"));
    }

    #[test]
    fn test_join_code_range() {
        for seed in 0..500 {
            let code = join_code(seed);
            let value: u64 = code.parse().unwrap();
            assert!((10_000..=99_999).contains(&value), "code {} out of range", code);
        }
    }

    #[test]
    fn test_add_member_idempotent() {
        let mut room = Room::new("sketches", member("u1", "ada"), 1000, 42);
        assert!(room.add_member(member("u2", "bea")));
        assert!(!room.add_member(member("u2", "bea")));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_invite_transitions() {
        let mut invite = Invite::new("12345", "sketches", "ada", "bea", 1000);
        assert!(invite.is_pending());

        assert!(invite.accept());
        assert_eq!(invite.status, InviteStatus::Accepted);

        // Settled invites stay settled.
        assert!(!invite.decline());
        assert_eq!(invite.status, InviteStatus::Accepted);
    }

    #[test]
    fn test_invite_status_wire_format() {
        let json = serde_json::to_string(&InviteStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }

    #[test]
    fn test_watcher_notifies_once() {
        let mut watcher = InviteWatcher::new("bea");
        let invites = vec![
            Invite::new("12345", "sketches", "ada", "bea", 1000),
            Invite::new("54321", "plans", "cal", "bea", 1001),
            Invite::new("11111", "other", "ada", "cal", 1002),
        ];

        let fresh = watcher.fresh(&invites);
        assert_eq!(fresh.len(), 2);

        // The same snapshot again surfaces nothing new.
        assert!(watcher.fresh(&invites).is_empty());
    }

    #[test]
    fn test_watcher_skips_settled_invites() {
        let mut watcher = InviteWatcher::new("bea");
        let mut invite = Invite::new("12345", "sketches", "ada", "bea", 1000);
        invite.decline();

        assert!(watcher.fresh(std::slice::from_ref(&invite)).is_empty());
    }

    #[test]
    fn test_fresh_watcher_renotifies() {
        // Notification state lives in the watcher, not the process: a new
        // mount gets a new watcher and surfaces pending invites again.
        let invites = vec![Invite::new("12345", "sketches", "ada", "bea", 1000)];

        let mut first = InviteWatcher::new("bea");
        assert_eq!(first.fresh(&invites).len(), 1);

        let mut second = InviteWatcher::new("bea");
        assert_eq!(second.fresh(&invites).len(), 1);
    }
}

//! The peer (conversation) aggregate.
//!
//! Read markers (`in_read` / `out_read`) live in the server id space: they
//! name the remote message id up to which content is considered read.  The
//! last-message pointer lives in the local replica id space.  The unread
//! count is always recomputed from message rows, never incremented blindly.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, PeerId, RemoteId};
use crate::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    pub id: PeerId,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub last_message_id: Option<MessageId>,
    pub unread_count: u32,
    pub in_read: RemoteId,
    pub out_read: RemoteId,
    pub pinned: Option<Box<Message>>,
    pub keyboard: Option<Keyboard>,
    pub major_order: i32,
    pub minor_order: i32,
}

impl Peer {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            title: None,
            avatar_url: None,
            last_message_id: None,
            unread_count: 0,
            in_read: 0,
            out_read: 0,
            pinned: None,
            keyboard: None,
            major_order: 0,
            minor_order: 0,
        }
    }
}

/// Lightweight projection of the aggregate used when recomputing counters
/// for a batch of peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerState {
    pub peer_id: PeerId,
    pub last_message_id: Option<MessageId>,
    pub unread_count: u32,
    pub in_read: RemoteId,
    pub out_read: RemoteId,
}

// ---------------------------------------------------------------------------
// Bot keyboard
// ---------------------------------------------------------------------------

/// Bot UI descriptor attached to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Keyboard {
    pub one_time: bool,
    pub inline: bool,
    pub buttons: Vec<Vec<KeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub payload: Option<String>,
    pub kind: String,
    pub color: Option<String>,
}

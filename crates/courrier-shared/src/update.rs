//! Typed change events published after patch application.
//!
//! These are the payloads of the engine's broadcast channels.  They mirror
//! the patch types field for field: consumers receive exactly the sub-fields
//! the originating patch set, in the order the patches were applied.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, CmId, MessageId, PeerId, ReactionId, RemoteId};
use crate::message::{MessageStatus, ReactionEntry};

// ---------------------------------------------------------------------------
// Message updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageUpdate {
    pub account_id: AccountId,
    pub message_id: MessageId,
    pub status: Option<StatusUpdate>,
    pub deletion: Option<DeleteUpdate>,
    pub important: Option<ImportantUpdate>,
    pub reaction: Option<ReactionUpdate>,
}

impl MessageUpdate {
    pub fn new(account_id: AccountId, message_id: MessageId) -> Self {
        Self {
            account_id,
            message_id,
            status: None,
            deletion: None,
            important: None,
            reaction: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: MessageStatus,
    pub remote_id: Option<RemoteId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteUpdate {
    pub deleted: bool,
    pub deleted_for_all: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportantUpdate {
    pub important: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionUpdate {
    pub peer_id: PeerId,
    pub keep_my_reaction: bool,
    pub my_reaction: Option<ReactionId>,
    pub reactions: Vec<ReactionEntry>,
}

// ---------------------------------------------------------------------------
// Peer updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerUpdate {
    pub account_id: AccountId,
    pub peer_id: PeerId,
    pub read_in: Option<ReadUpdate>,
    pub read_out: Option<ReadUpdate>,
    pub last_message: Option<LastMessageUpdate>,
    pub unread: Option<UnreadUpdate>,
    pub title: Option<TitleUpdate>,
    pub pin: Option<PinUpdate>,
}

impl PeerUpdate {
    pub fn new(account_id: AccountId, peer_id: PeerId) -> Self {
        Self {
            account_id,
            peer_id,
            read_in: None,
            read_out: None,
            last_message: None,
            unread: None,
            title: None,
            pin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadUpdate {
    pub message_id: RemoteId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessageUpdate {
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadUpdate {
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleUpdate {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinUpdate {
    pub pinned_message_id: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// Standalone events
// ---------------------------------------------------------------------------

/// A conversation disappeared from the local replica.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerDeleting {
    pub account_id: AccountId,
    pub peer_id: PeerId,
}

/// Typing indicator for a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteText {
    pub account_id: AccountId,
    pub peer_id: PeerId,
    pub from_ids: Vec<PeerId>,
    pub is_text: bool,
}

/// Emitted exactly once per successful delivery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentMsg {
    pub message_id: MessageId,
    pub remote_id: RemoteId,
    pub peer_id: PeerId,
    pub conversation_message_id: CmId,
    pub account_id: AccountId,
}

/// A delivery attempt failed with a user-visible error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendErrorEvent {
    pub account_id: AccountId,
    pub message_id: MessageId,
    pub peer_id: PeerId,
    pub reason: String,
}

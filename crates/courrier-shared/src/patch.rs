//! Sparse partial updates for messages and peers.
//!
//! A patch targets one entity by key and carries independently optional
//! sub-patches.  Sub-patches are commutative across fields and
//! last-write-wins within one field; applying a patch never requires the
//! previous full entity state.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, PeerId, ReactionId, RemoteId};
use crate::message::{Message, ReactionEntry};

// ---------------------------------------------------------------------------
// Message patches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePatch {
    pub message_id: MessageId,
    pub peer_id: PeerId,
    pub deletion: Option<Deletion>,
    pub important: Option<Important>,
    pub reaction: Option<ReactionPatch>,
}

impl MessagePatch {
    pub fn new(message_id: MessageId, peer_id: PeerId) -> Self {
        Self {
            message_id,
            peer_id,
            deletion: None,
            important: None,
            reaction: None,
        }
    }

    pub fn with_deletion(mut self, deleted: bool, deleted_for_all: bool) -> Self {
        self.deletion = Some(Deletion {
            deleted,
            deleted_for_all,
        });
        self
    }

    pub fn with_important(mut self, important: bool) -> Self {
        self.important = Some(Important { important });
        self
    }

    pub fn with_reaction(mut self, reaction: ReactionPatch) -> Self {
        self.reaction = Some(reaction);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deletion {
    pub deleted: bool,
    pub deleted_for_all: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Important {
    pub important: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionPatch {
    /// Keep the locally-known "my reaction" instead of replacing it.
    pub keep_my_reaction: bool,
    pub my_reaction: Option<ReactionId>,
    pub reactions: Vec<ReactionEntry>,
}

// ---------------------------------------------------------------------------
// Peer patches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PeerPatch {
    pub peer_id: PeerId,
    pub in_read: Option<ReadMarker>,
    pub out_read: Option<ReadMarker>,
    pub unread: Option<UnreadCount>,
    pub last_message: Option<LastMessage>,
    pub title: Option<TitlePatch>,
    pub pin: Option<PinPatch>,
}

impl PeerPatch {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            ..Default::default()
        }
    }

    pub fn with_in_read(mut self, id: RemoteId) -> Self {
        self.in_read = Some(ReadMarker { id });
        self
    }

    pub fn with_out_read(mut self, id: RemoteId) -> Self {
        self.out_read = Some(ReadMarker { id });
        self
    }

    pub fn with_unread_count(mut self, count: u32) -> Self {
        self.unread = Some(UnreadCount { count });
        self
    }

    pub fn with_last_message(mut self, id: MessageId) -> Self {
        self.last_message = Some(LastMessage { id });
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = Some(TitlePatch { title });
        self
    }

    pub fn with_pin(mut self, pinned: Option<Message>) -> Self {
        self.pin = Some(PinPatch {
            pinned: pinned.map(Box::new),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadMarker {
    pub id: RemoteId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCount {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    pub id: MessageId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitlePatch {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinPatch {
    /// `None` unpins.
    pub pinned: Option<Box<Message>>,
}
